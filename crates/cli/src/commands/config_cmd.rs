//! `splforge config`: configuration commands.

use splforge_config::AppConfig;

pub fn default_toml() {
    println!("{}", AppConfig::default_toml());
}

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.has_api_key() {
                warnings.push("No API key set (set SPLFORGE_API_KEY or OPENAI_API_KEY)");
            }
            if !config.blobs.dir.is_absolute() {
                warnings.push("blobs.dir is relative; binary results land under the working directory");
            }

            if warnings.is_empty() {
                println!("   All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warning: {w}");
                }
            }

            println!();
            println!("   Endpoint:   {}", config.base_url);
            println!("   Model:      {}", config.default_model);
            println!("   Agent type: {:?}", config.engine.agent_type);
            println!("   Memory cap: {}", config.engine.memory_cap);
            println!("   Timeout:    {}ms", config.engine.invocation_timeout_ms);
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub fn path() {
    println!("{}", AppConfig::config_dir().join("config.toml").display());
}
