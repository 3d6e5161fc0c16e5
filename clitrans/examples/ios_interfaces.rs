//! List the interfaces of an IOS device and set a description on one.
//!
//! Usage: cargo run --example ios_interfaces -- <host> <user> <password> <interface> [description]
//!
//! Set `RUST_LOG=clitrans=debug` to follow the session.

use std::env;

use clitrans::{DeviceBuilder, Modification, Path, vendors};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 5 {
        eprintln!(
            "Usage: {} <host> <user> <password> <interface> [description]",
            args[0]
        );
        std::process::exit(1);
    }
    let (host, user, password, interface) = (&args[1], &args[2], &args[3], &args[4]);

    let units = vendors::registry()?;
    let device = DeviceBuilder::new(host.as_str())
        .username(user.as_str())
        .password(password.as_str())
        .device("ios", "15")
        .connect(&units)
        .await?;

    println!("Connected to {} ({})", device.name(), device.unit_name());

    for (path, config) in device
        .read_all(&Path::parse("/interfaces/interface")?)
        .await?
    {
        println!("{}: {}", path, config);
    }

    let config_path = Path::parse("/interfaces/interface")?
        .with_key(interface.as_str())
        .child("config");
    let before = device.read(&config_path).await?;
    println!("Before: {:?}", before);

    if let Some(description) = args.get(5) {
        let mut after = before.clone().unwrap_or_else(|| json!({"name": interface}));
        after["description"] = json!(description);

        let change = Modification::from_pair(config_path.clone(), before, Some(after));
        if let Some(change) = change {
            device.apply(vec![change]).await?;
            println!("After: {:?}", device.read(&config_path).await?);
        }
    }

    device.close().await?;
    Ok(())
}
