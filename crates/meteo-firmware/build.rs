//! Bakes the network settings from `.env` into the firmware image.
//!
//! Recognised keys are `METEO_WIFI_SSID`, `METEO_WIFI_PASS` and
//! `METEO_NTP_SERVER`. A missing `.env` builds a logger that never attempts
//! time synchronization and names every batch after a session id.

const KEYS: [&str; 3] = ["METEO_WIFI_SSID", "METEO_WIFI_PASS", "METEO_NTP_SERVER"];

fn main() {
    println!("cargo:rerun-if-changed=.env");
    for key in KEYS {
        println!("cargo:rerun-if-env-changed={key}");
    }

    match dotenvy::dotenv_iter() {
        Ok(vars) => {
            for (key, value) in vars.flatten() {
                if KEYS.contains(&key.as_str()) {
                    println!("cargo:rustc-env={key}={value}");
                }
            }
        }
        Err(_) => println!("cargo:warning=no .env file, building without Wi-Fi credentials"),
    }

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
