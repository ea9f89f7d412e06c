use std::fs;
use std::path::PathBuf;
use tracing::{error, info};

pub struct PortablePathManager;

impl PortablePathManager {
    /// Returns the application root directory (where the executable lives).
    pub fn root_dir() -> PathBuf {
        match std::env::current_exe() {
            Ok(mut path) => {
                path.pop(); // strip the executable name
                #[cfg(debug_assertions)]
                {
                    // In development the binary sits in <workspace>/target/debug
                    let core_path = path.join("..").join("..").join("apps").join("core");
                    if core_path.exists() {
                        return core_path;
                    }
                }
                path
            }
            Err(e) => {
                error!(
                    "Failed to get current exe path: {}. Falling back to current_dir.",
                    e
                );
                std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
            }
        }
    }

    /// Main data directory (./data).
    pub fn data_dir() -> PathBuf {
        Self::root_dir().join("data")
    }

    /// Default script definition (./data/script.json).
    pub fn script_path() -> PathBuf {
        Self::data_dir().join("script.json")
    }

    /// Default lead sheet (./data/leads.csv).
    pub fn leads_path() -> PathBuf {
        Self::data_dir().join("leads.csv")
    }

    /// Creates the data directory if it does not exist.
    pub fn init() -> Result<(), std::io::Error> {
        let data_path = Self::data_dir();
        if !data_path.exists() {
            info!("Creating data directory: {:?}", data_path);
            fs::create_dir_all(&data_path)?;
        }
        Ok(())
    }
}
