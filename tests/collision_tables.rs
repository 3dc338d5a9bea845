// End-to-end collision pipeline: cross-section CSV files -> tabulated
// frequencies -> cumulative probability table -> sampled collisions during
// evolve.

use std::path::PathBuf;

use picsim::{
    default_nbins, default_ranges, write_cross_section, CollisionConfig, CollisionKind,
    Simulation,
};

fn xsec_file(name: &str, threshold_ev: f64) -> PathBuf {
    let path = std::env::temp_dir().join(name);
    // Log-spaced sample energies across the whole binned domain.
    let energies: Vec<f64> = (0..200)
        .map(|i| 1.0e-3 * (342.0e3_f64 / 1.0e-3).powf(i as f64 / 199.0))
        .collect();
    write_cross_section(&path, &energies, |e| {
        if e < threshold_ev {
            0.0
        } else {
            1.0e-20 / (1.0 + e / 100.0)
        }
    })
    .unwrap();
    path
}

fn collision_sim(elastic: &PathBuf, inelastic: &PathBuf) -> Simulation {
    let mut sim = Simulation::new();
    // A physical timestep; the defaults exercise geometry, not collisions.
    sim.set_config("system.timestep", "1.0e-12").unwrap();
    sim.set_config("system.cellSize", "[4.0e-3, 4.0e-3, 4.0e-3]")
        .unwrap();
    sim.set_config("particle.specie.a.randomSeed", "808").unwrap();
    sim.config.collisions.push(CollisionConfig {
        name: "a.elastic".to_string(),
        specie: "a".to_string(),
        gas: "bck".to_string(),
        kind: CollisionKind::Elastic,
        threshold_ev: 0.0,
        file_name: elastic.display().to_string(),
        ranges: default_ranges(),
        nbins: default_nbins(),
    });
    sim.config.collisions.push(CollisionConfig {
        name: "a.inelastic".to_string(),
        specie: "a".to_string(),
        gas: "bck".to_string(),
        kind: CollisionKind::Inelastic,
        threshold_ev: 12.0,
        file_name: inelastic.display().to_string(),
        ranges: default_ranges(),
        nbins: default_nbins(),
    });
    sim
}

#[test]
fn test_tables_built_from_csv_files() {
    let elastic = xsec_file("picsim_it_elastic.csv", 0.0);
    let inelastic = xsec_file("picsim_it_inelastic.csv", 12.0);
    let mut sim = collision_sim(&elastic, &inelastic);
    sim.load_cfg_data().unwrap();
    sim.load_sim_data().unwrap();

    assert_eq!(sim.collisions.len(), 2);
    assert_eq!(sim.prob_tabs.len(), 1);
    let tab = &sim.prob_tabs[0];
    assert_eq!(tab.row_cnt, 8000);
    assert_eq!(tab.col_cnt, 2);
    assert_eq!(tab.overflow_bins, 0);
    for row in 0..tab.row_cnt {
        let r = tab.row(row);
        assert!(0.0 <= r[0] && r[0] <= r[1] && r[1] <= 1.0);
    }
    // The inelastic channel is dead below its 12 eV threshold.
    let el = &sim.collisions[0];
    let inel = &sim.collisions[1];
    assert!(el.freq.at(5.0) > 0.0);
    assert_eq!(inel.xsec.at(5.0), 0.0);
    assert!(inel.xsec.at(50.0) > 0.0);

    let data = sim.sim_data();
    assert_eq!(data.tables.len(), 1);
    assert_eq!(data.tables[0].channels, vec!["a.elastic", "a.inelastic"]);
    assert_eq!(data.tables[0].nbins, default_nbins().as_slice());

    std::fs::remove_file(&elastic).ok();
    std::fs::remove_file(&inelastic).ok();
}

#[test]
fn test_evolve_with_collisions_keeps_energy_bounded() {
    let elastic = xsec_file("picsim_it_elastic2.csv", 0.0);
    let inelastic = xsec_file("picsim_it_inelastic2.csv", 12.0);
    let mut sim = collision_sim(&elastic, &inelastic);
    sim.load_cfg_data().unwrap();
    sim.load_sim_data().unwrap();
    sim.run_command_chain("create").unwrap();
    let created = sim.particle_count(0);

    for _ in 0..50 {
        sim.run_command_chain("evolve").unwrap();
    }
    // Collisions redirect or slow particles, never create or destroy them,
    // and never push the normalized speed past the per-axis limit.
    assert_eq!(sim.particle_count(0), created);
    for st in sim.store.states() {
        assert!(st.vel.norm() <= 1.0 + 1e-12);
    }

    std::fs::remove_file(&elastic).ok();
    std::fs::remove_file(&inelastic).ok();
}

#[test]
fn test_missing_cross_section_file_fails_load() {
    let missing = std::env::temp_dir().join("picsim_it_nonexistent.csv");
    let mut sim = collision_sim(&missing, &missing);
    sim.load_cfg_data().unwrap();
    let err = sim.load_sim_data().unwrap_err();
    assert_eq!(err.status_code(), 5);
}
