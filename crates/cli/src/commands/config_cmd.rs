//! `clipflow config`: print the default configuration.

use clipflow_config::AppConfig;

pub fn run() {
    println!("# {}", AppConfig::config_dir().join("config.toml").display());
    print!("{}", AppConfig::default_toml());
}
