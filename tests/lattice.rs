use glam::Vec3;
use portfolio_stage::assets::MemorySource;
use portfolio_stage::config::StarfieldConfig;
use portfolio_stage::{LatticeConfig, LoadingManager, PageConfig, Stage};

#[test]
fn every_row_shares_one_depth() {
    let lattice = LatticeConfig::default();
    for row in lattice.rows() {
        let row = row.unwrap();
        let z = -((row.index + 1) as f32) * 3.0;
        assert!(row.cube_positions().iter().all(|p| p.z == z));
        assert!(row.beams.iter().all(|beam| beam.coords.z == z));
        assert_eq!(row.cube_positions().len(), 12);
        assert_eq!(row.beams.len(), 4);
    }
}

#[test]
fn bands_are_symmetric() {
    let lattice = LatticeConfig::default();
    let row = lattice.row(7).unwrap();
    let xs = |band: &[Vec3]| band.iter().map(|p| p.x).collect::<Vec<_>>();
    assert_eq!(xs(&row.top), vec![-6.0, -3.0, 0.0, 3.0, 6.0]);
    assert_eq!(xs(&row.top), xs(&row.bottom));
    assert!(row.top.iter().all(|p| p.y == 3.5));
    assert!(row.bottom.iter().all(|p| p.y == -3.5));
    assert!(row.middle.iter().all(|p| p.y == 0.0));
    assert_eq!(row.middle[0].x, -row.middle[1].x);
}

#[test]
fn layout_is_idempotent() {
    let lattice = LatticeConfig::default();
    assert_eq!(lattice.row(3), lattice.row(3));
}

#[test]
fn stage_places_the_whole_lattice() {
    let config = PageConfig {
        starfield: StarfieldConfig {
            count: 10,
            ..StarfieldConfig::default()
        },
        ..PageConfig::default()
    };
    let mut loader = LoadingManager::new();
    let stage = Stage::build(&config, &MemorySource::new(), &mut loader).unwrap();

    let graph = &stage.scenes().squares.graph;
    assert_eq!(stage.squares().lattice_meshes, 320);
    assert_eq!(graph.count_by(|node| node.name.starts_with("cube_")), 240);
    assert_eq!(graph.count_by(|node| node.name.starts_with("beam_")), 80);
    assert_eq!(loader.failed(), loader.total());
}
