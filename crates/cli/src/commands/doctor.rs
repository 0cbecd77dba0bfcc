//! `codevox doctor`: diagnose configuration health.

use codevox_config::AppConfig;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_path();
    let mut problems = 0usize;

    println!("codevox doctor\n");

    if config_path.exists() {
        println!("[ok]   config file: {}", config_path.display());
    } else {
        println!(
            "[info] no config file at {} (defaults in effect)",
            config_path.display()
        );
    }

    let config = match AppConfig::load() {
        Ok(c) => {
            println!("[ok]   configuration valid");
            c
        }
        Err(e) => {
            println!("[fail] configuration invalid: {e}");
            std::process::exit(1);
        }
    };

    if config.api_key.is_some() {
        println!("[ok]   API key present");
    } else {
        println!(
            "[warn] no API key: set {} or {} for `codevox ask` \
             (gateway callers supply their own)",
            codevox_config::API_KEY_ENV,
            codevox_config::OPENAI_API_KEY_ENV,
        );
        problems += 1;
    }

    match std::fs::create_dir_all(&config.projects_root) {
        Ok(()) => println!(
            "[ok]   projects root writable: {}",
            config.projects_root.display()
        ),
        Err(e) => {
            println!(
                "[fail] projects root {}: {e}",
                config.projects_root.display()
            );
            problems += 1;
        }
    }

    println!(
        "[ok]   model: {} (temperature {}, max {} steps)",
        config.default_model, config.default_temperature, config.max_steps
    );
    println!(
        "[ok]   command allowlist: {} entries, timeout {}s",
        config.tools.allowed_commands.len(),
        config.tools.command_timeout_secs
    );

    if problems == 0 {
        println!("\nAll checks passed.");
    } else {
        println!("\n{problems} warning(s).");
    }

    Ok(())
}
