//! Exercises the hierarchical-store persistence bridge end to end without a
//! real HDF5 dependency: build a distribution, save it to an in-memory
//! store, drop it, and reload.

use flowcache::persistence::{load, save, MemoryStore};
use flowcache::{CacheConfig, Distribution};

fn main() -> flowcache::Result<()> {
    tracing_subscriber::fmt::init();

    let config = CacheConfig { enabled: false, ..CacheConfig::default() };
    let mut dist = Distribution::new(2, config.clone())?;
    for i in 0..20 {
        let t = f64::from(i);
        dist.set_row(t, &[t, t * t])?;
    }

    let mut store = MemoryStore::new();
    save(&mut dist, &mut store, "/demo/series")?;
    drop(dist);

    let mut reloaded = load(&store, "/demo/series", config)?;
    for &t in reloaded.times().to_vec().iter() {
        println!("t={t} -> {:?}", reloaded.get_value(t)?);
    }
    Ok(())
}
