//! End-to-end scenarios from the distribution/cache-engine specification.

use flowcache::{CacheConfig, Distribution};

fn disabled_config() -> CacheConfig {
    CacheConfig { enabled: false, ..CacheConfig::default() }
}

fn windowed_config(dir: &std::path::Path, w: usize) -> CacheConfig {
    CacheConfig { enabled: true, w, cache_path: dir.to_path_buf() }
}

#[test]
fn scenario_1_interpolation_and_flat_extrapolation() {
    let mut d = Distribution::new(2, disabled_config()).unwrap();
    d.set_row(0.0, &[1.0, 10.0]).unwrap();
    d.set_row(1.0, &[2.0, 20.0]).unwrap();
    d.set_row(2.0, &[3.0, 30.0]).unwrap();

    assert_eq!(d.get_value(0.5).unwrap(), vec![1.5, 15.0]);
    assert_eq!(d.get_value(-1.0).unwrap(), vec![1.0, 10.0]);
    assert_eq!(d.get_value(5.0).unwrap(), vec![3.0, 30.0]);
}

#[test]
fn scenario_2_sliding_window_stays_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let mut d = Distribution::new(2, windowed_config(dir.path(), 2)).unwrap();

    for i in 0..7 {
        d.set_row(f64::from(i), &[f64::from(i), -f64::from(i)]).unwrap();
    }

    assert_eq!(d.get_value(3.0).unwrap(), vec![3.0, -3.0]);
    assert_eq!(d.get_value(6.0).unwrap(), vec![6.0, -6.0]);
}

#[test]
fn scenario_3_remove_range_then_reclaim_truncates_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut d = Distribution::new(1, windowed_config(dir.path(), 100)).unwrap();

    for chunk in 0..5 {
        for row in 0..100 {
            let t = f64::from(chunk * 100 + row);
            d.set_row(t, &[t]).unwrap();
        }
    }

    // force every chunk resident-then-spilled so descriptors exist on disk
    d.load_all().unwrap();

    let sizes_before: u64 = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.metadata().unwrap().len())
        .sum();

    d.remove_time_points(200.0, 399.0).unwrap();
    d.flush().unwrap();

    let sizes_after: u64 = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.metadata().unwrap().len())
        .sum();

    assert!(sizes_after <= sizes_before);

    for t in [0.0, 50.0, 150.0, 450.0, 499.0] {
        assert_eq!(d.get_value(t).unwrap(), vec![t]);
    }
    for t in 200..400 {
        assert!(!d.times().contains(&f64::from(t)));
    }
}

#[test]
fn scenario_4_set_dimensions_number_extends_with_zeros() {
    let mut d = Distribution::new(2, disabled_config()).unwrap();
    d.set_row(0.0, &[1.0, 2.0]).unwrap();
    d.set_row(1.0, &[3.0, 4.0]).unwrap();
    d.set_row(2.0, &[5.0, 6.0]).unwrap();

    d.set_dimensions_number(3).unwrap();

    assert_eq!(d.get_value(0.0).unwrap(), vec![1.0, 2.0, 0.0]);
    assert_eq!(d.get_value(1.0).unwrap(), vec![3.0, 4.0, 0.0]);
    assert_eq!(d.get_value(2.0).unwrap(), vec![5.0, 6.0, 0.0]);
}

#[test]
fn scenario_4b_dimension_resize_reaches_spilled_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let mut d = Distribution::new(2, windowed_config(dir.path(), 2)).unwrap();
    for i in 0..10 {
        d.set_row(f64::from(i), &[f64::from(i), -f64::from(i)]).unwrap();
    }
    d.flush().unwrap();

    d.set_dimensions_number(3).unwrap();
    for i in 0..10 {
        assert_eq!(d.get_value(f64::from(i)).unwrap(), vec![f64::from(i), -f64::from(i), 0.0]);
    }

    d.add_dimension().unwrap();
    for i in 0..10 {
        assert_eq!(d.get_value(f64::from(i)).unwrap(), vec![f64::from(i), -f64::from(i), 0.0, 0.0]);
    }

    d.remove_dimension(1).unwrap();
    for i in 0..10 {
        assert_eq!(d.get_value(f64::from(i)).unwrap(), vec![f64::from(i), 0.0, 0.0]);
    }
}

#[test]
fn scenario_5_quadratic_extrapolation_through_a_parabola() {
    let mut d = Distribution::new(1, disabled_config()).unwrap();
    d.set_row(0.0, &[0.0]).unwrap();
    d.set_row(1.0, &[2.0]).unwrap();
    d.set_row(2.0, &[6.0]).unwrap();

    d.extrapolate_to_point_quadratic(0.0, 1.0, 2.0, 3.0).unwrap();

    assert_eq!(d.get_value(3.0).unwrap(), vec![12.0]);
}

#[test]
fn scenario_6_save_restore_round_trip() {
    use flowcache::persistence::{load, save, MemoryStore};

    let mut d = Distribution::new(2, disabled_config()).unwrap();
    for i in 0..10 {
        d.set_row(f64::from(i), &[f64::from(i), f64::from(i) * 2.0]).unwrap();
    }

    let mut store = MemoryStore::new();
    save(&mut d, &mut store, "/dist/0").unwrap();

    let mut reloaded = load(&store, "/dist/0", disabled_config()).unwrap();
    assert_eq!(reloaded.times(), d.times());
    for &t in d.times().to_vec().iter() {
        assert_eq!(reloaded.get_value(t).unwrap(), d.get_value(t).unwrap());
    }
}

#[test]
fn overwrite_law_holds() {
    let mut d = Distribution::new(1, disabled_config()).unwrap();
    d.set_row(0.0, &[1.0]).unwrap();
    d.set_value(0.0, 0, 42.0).unwrap();
    assert_eq!(d.get_value_dim(0.0, 0).unwrap(), 42.0);
}

#[test]
fn insert_idempotence_law_holds() {
    let mut d = Distribution::new(1, disabled_config()).unwrap();
    d.set_row(0.0, &[1.0]).unwrap();
    d.add_time_point(0.0, None).unwrap();
    d.add_time_point(0.0, None).unwrap();
    assert_eq!(d.len(), 1);
}

#[test]
fn flush_reload_round_trip_is_bit_identical() {
    let dir = tempfile::tempdir().unwrap();
    let mut d = Distribution::new(1, windowed_config(dir.path(), 3)).unwrap();
    for i in 0..30 {
        d.set_row(f64::from(i), &[f64::from(i) * 1.5]).unwrap();
    }
    let before: Vec<f64> = (0..30).map(|i| d.get_value(f64::from(i)).unwrap()[0]).collect();
    d.load_all().unwrap();
    let after: Vec<f64> = (0..30).map(|i| d.get_value(f64::from(i)).unwrap()[0]).collect();
    assert_eq!(before, after);
}
