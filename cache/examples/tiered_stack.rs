use fibre_proxy_cache::{CacheConfig, ShardClient, StackBuilder, Store};

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let dir = tempfile::tempdir().expect("Failed to create cache directory");
  let yaml = format!(
    "memory:\n  capacity: 64\ndisk:\n  enabled: true\n  dir: {}\n  capacity: 4096\n",
    dir.path().display()
  );
  let config = CacheConfig::from_yaml_str(&yaml).expect("Invalid configuration");

  // Memory holds 64 bytes, disk holds 4 KiB, so older bodies fall back to disk.
  let stack = StackBuilder::from_config(&config)
    .build()
    .expect("Failed to build cache stack");

  let client = ShardClient::new(config.router.clone()).expect("Invalid router configuration");
  client.set_backends(["http://proxy-1:3000", "http://proxy-2:3000/handler"]);

  for i in 0..4 {
    let origin = format!("http://origin.test/asset-{}.js?v={}&lang=en", i, i);
    let route = client.route(&origin).expect("No backend available");
    let forward = route.forward_url().expect("Invalid backend URL");
    println!("{} -> {}", origin, forward);
    stack.set(
      &format!("http://origin.test/asset-{}.js", i),
      format!("body of asset {:>20}", i).as_bytes(),
    );
  }

  // The first asset has been pushed out of memory; reading it promotes it back.
  let first = stack.get("http://origin.test/asset-0.js");
  println!("\nasset-0 found: {}", first.is_some());

  println!("\nMemory stats: {:#?}", stack.memory_stats());
  println!("Disk stats: {:#?}", stack.disk_stats());
}
