//! `codevox tools`: print the tool catalog.

use codevox_config::AppConfig;
use codevox_gateway::build_catalog;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let catalog = build_catalog(&config)?;

    println!("Available tools (root: {}):", catalog.root().display());
    for def in catalog.definitions() {
        let params: Vec<String> = def.parameters["properties"]
            .as_object()
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default();
        println!("  {}({})", def.name, params.join(", "));
        println!("      {}", def.description);
    }

    Ok(())
}
