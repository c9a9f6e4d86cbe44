fn main() {
    // Load .env file for the settings location
    load_env_config();

    embed_settings();

    linker_be_nice();
    // make sure linkall.x is the last linker script (otherwise might cause problems with flip-link)
    println!("cargo:rustc-link-arg=-Tlinkall.x");
}

/// Load environment configuration from .env file
/// Environment variables take priority over .env file values
fn load_env_config() {
    use std::path::Path;

    println!("cargo:rerun-if-changed=.env");
    println!("cargo:rerun-if-env-changed=SETTINGS_FILE");

    if Path::new(".env").exists() {
        match dotenvy::dotenv() {
            Ok(_) => println!("cargo:warning=Loaded .env file"),
            Err(e) => println!("cargo:warning=Failed to load .env file: {}", e),
        }
    }
}

/// Copy the settings document into OUT_DIR so main.rs can include it
///
/// A missing file embeds an empty document; the board then runs with default
/// settings and restarts every cycle until it is reflashed.
fn embed_settings() {
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    let settings = env::var("SETTINGS_FILE")
        .map(|path| path.trim().to_string())
        .unwrap_or_else(|_| "setting.json".to_string());
    println!("cargo:rerun-if-changed={}", settings);

    let out = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo")).join("setting.json");

    match fs::read(&settings) {
        Ok(bytes) => {
            println!("cargo:warning=Embedding {} ({} bytes)", settings, bytes.len());
            fs::write(&out, bytes).expect("write embedded settings");
        }
        Err(e) => {
            println!("cargo:warning={} not readable ({}) - board will run with default settings", settings, e);
            fs::write(&out, b"").expect("write embedded settings");
        }
    }
}

fn linker_be_nice() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        let kind = &args[1];
        let what = &args[2];

        match kind.as_str() {
            "undefined-symbol" => match what.as_str() {
                "_stack_start" => {
                    eprintln!();
                    eprintln!("💡 Is the linker script `linkall.x` missing?");
                    eprintln!();
                }
                "esp_wifi_preempt_enable"
                | "esp_wifi_preempt_yield_task"
                | "esp_wifi_preempt_task_create" => {
                    eprintln!();
                    eprintln!("💡 `esp-wifi` has no scheduler enabled. Make sure you have the `builtin-scheduler` feature enabled, or that you provide an external scheduler.");
                    eprintln!();
                }
                _ => (),
            },
            // we don't have anything helpful for "missing-lib" yet
            _ => {
                std::process::exit(1);
            }
        }

        std::process::exit(0);
    }

    println!(
        "cargo:rustc-link-arg=--error-handling-script={}",
        std::env::current_exe().unwrap().display()
    );
}
