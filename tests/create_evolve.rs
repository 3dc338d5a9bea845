// Integration tests for the create/evolve command chain: cylindrical
// population statistics and long-run wall/migration stability.

use nalgebra::Vector3;
use picsim::{ChainPhase, Simulation, NO_STATE};

/// `create` rejection-samples initial positions, so the accepted fraction
/// over the valid (corner-touching) cells must reproduce the true cylinder
/// volume.
#[test]
fn test_cylindrical_create_matches_volume_ratio() {
    let mut sim = Simulation::new();
    sim.set_config("particle.specie.a.randomSeed", "2024").unwrap();
    sim.load_cfg_data().unwrap();
    sim.load_sim_data().unwrap();
    sim.create().unwrap();

    let cfg = sim.cfg_data().unwrap();
    assert_eq!(cfg.cell_count, [20, 20, 400]);
    assert_eq!(cfg.total_cell_count, 160000);
    assert!(cfg.valid_cell_count < cfg.total_cell_count);

    let attempts = cfg.valid_cell_count as f64 * 10.0;
    let accepted = sim.particle_count(0) as f64;
    // Cylinder volume over valid-cell volume, in cell units.
    let radius = cfg.cell_count[0] as f64 / 2.0;
    let cylinder = std::f64::consts::PI * radius * radius * cfg.cell_count[2] as f64;
    let expected = cylinder / cfg.valid_cell_count as f64;
    let measured = accepted / attempts;
    assert!(
        (measured - expected).abs() < 5.0e-3,
        "volume ratio {} vs expected {}",
        measured,
        expected
    );
}

/// 100 steps on a cylindrical instance with reflecting walls: every step
/// succeeds, nothing is lost, and every particle stays inside the cylinder
/// with position and normalized velocity in range.
#[test]
fn test_hundred_steps_stay_inside_cylinder() {
    let mut sim = Simulation::new();
    // Coarser cells keep the particle count test-sized.
    sim.set_config("system.cellSize", "[2.0e-3, 2.0e-3, 2.0e-3]")
        .unwrap();
    sim.set_config("particle.specie.a.statesPerCell", "3").unwrap();
    sim.set_config("particle.specie.a.randomSeed", "5150").unwrap();
    sim.load_cfg_data().unwrap();
    sim.load_sim_data().unwrap();
    sim.run_command_chain("create").unwrap();
    let created = sim.particle_count(0);
    assert!(created > 0);

    for _ in 0..100 {
        sim.run_command_chain("evolve").unwrap();
    }
    assert_eq!(sim.phase, ChainPhase::Evolving);
    assert_eq!(sim.step, 100);
    assert_eq!(sim.particle_count(0), created);

    let grid = sim.grid.as_ref().unwrap();
    let radius = grid.cell_count.x as f64 / 2.0;
    let max_r = radius * 1.00001;
    let mut walked = 0usize;
    for cell in 0..grid.valid_cell_count() as u32 {
        let base = grid.cell_pos_of(cell).unwrap().cast::<f64>();
        for id in sim.store.walk_cell(0, cell) {
            let st = sim.store.state(id);
            for i in 0..3 {
                assert!(
                    (0.0..=1.0).contains(&st.pos[i]),
                    "pos out of cell range: {:?}",
                    st.pos
                );
            }
            assert!(st.vel.norm() <= 1.0 + 1e-12);
            let abs = base + st.pos;
            let r = (Vector3::new(abs.x - radius, abs.y - radius, 0.0)).norm();
            assert!(r <= max_r, "particle at radius {} > {}", r, max_r);
            walked += 1;
        }
    }
    assert_eq!(walked, created);
}

/// Walking a cell list by hand reaches NO_STATE exactly once and the
/// prev links mirror the next links.
#[test]
fn test_cell_lists_are_consistent_after_evolve() {
    let mut sim = Simulation::new();
    sim.set_config("system.geometry", "cuboid").unwrap();
    sim.set_config("system.geometrySize", "[0.004, 0.004, 0.004]")
        .unwrap();
    sim.set_config("particle.specie.a.randomSeed", "31").unwrap();
    sim.load_cfg_data().unwrap();
    sim.load_sim_data().unwrap();
    sim.run_command_chain("create").unwrap();
    for _ in 0..25 {
        sim.run_command_chain("evolve").unwrap();
    }

    let grid = sim.grid.as_ref().unwrap();
    let total = sim.particle_count(0);
    let mut seen = vec![false; sim.store.states().len()];
    let mut visited = 0usize;
    for cell in 0..grid.valid_cell_count() as u32 {
        let mut prev = NO_STATE;
        let mut cursor = sim.store.head(0, cell);
        let mut hops = 0usize;
        while cursor != NO_STATE {
            let st = sim.store.state(cursor);
            assert_eq!(st.prev, prev, "broken prev link in cell {}", cell);
            assert!(!seen[cursor as usize], "state {} in two lists", cursor);
            seen[cursor as usize] = true;
            prev = cursor;
            cursor = st.next;
            hops += 1;
            assert!(hops <= total, "cycle in cell {} list", cell);
        }
        visited += hops;
    }
    assert_eq!(visited, total);
}

/// Two instances with the same seeds evolve identically; handles through
/// the registry address independent instances.
#[test]
fn test_seeded_instances_reproduce() {
    let run = || {
        let id = picsim::registry::new_simulation();
        picsim::registry::with(id, |sim| {
            sim.set_config("system.cellSize", "[4.0e-3, 4.0e-3, 4.0e-3]")
                .unwrap();
            sim.set_config("particle.specie.a.randomSeed", "99").unwrap();
            sim.load_cfg_data().unwrap();
            sim.load_sim_data().unwrap();
            sim.run_command_chain("create").unwrap();
            for _ in 0..10 {
                sim.run_command_chain("evolve").unwrap();
            }
            let mut out: Vec<(f64, f64)> = sim
                .store
                .states()
                .iter()
                .map(|s| (s.pos.x, s.vel.z))
                .collect();
            out.truncate(200);
            out
        })
        .map(|out| {
            picsim::registry::delete(id);
            out
        })
        .unwrap()
    };
    assert_eq!(run(), run());
}
