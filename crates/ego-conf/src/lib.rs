pub mod diagnostics;

use std::path::Path;

use camino::Utf8Path;
use camino::Utf8PathBuf;
use config::Config;
use config::ConfigError as ExternalConfigError;
use config::File;
use config::FileFormat;
use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

pub use crate::diagnostics::DiagnosticSeverity;
pub use crate::diagnostics::DiagnosticsConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration build/deserialize error")]
    Config(#[from] ExternalConfigError),
    #[error("Template extension must not be empty")]
    EmptyExtension,
}

/// Project settings for `ego`, read from `ego.toml` files.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Go package name of the generated file. Derived from the output
    /// directory when unset.
    pub package: Option<String>,
    pub output: Utf8PathBuf,
    /// Template file extension, without the leading dot.
    pub extension: String,
    /// Run `gofmt` over the generated file.
    pub fmt: bool,
    pub diagnostics: DiagnosticsConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            package: None,
            output: Utf8PathBuf::from("ego.go"),
            extension: "ego".to_string(),
            fmt: true,
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

impl Settings {
    pub fn new(project_root: &Utf8Path) -> Result<Self, ConfigError> {
        let user_config_file = ProjectDirs::from("com.github", "benbjohnson", "ego")
            .map(|proj_dirs| proj_dirs.config_dir().join("ego.toml"));

        Self::load_from_paths(project_root, user_config_file.as_deref())
    }

    fn load_from_paths(
        project_root: &Utf8Path,
        user_config_path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = user_config_path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        for name in [".ego.toml", "ego.toml"] {
            builder = builder.add_source(
                File::from(project_root.join(name).as_std_path())
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let config = builder.build()?;
        let mut settings: Settings = config.try_deserialize()?;

        let extension = settings.extension.trim_start_matches('.');
        if extension.is_empty() {
            return Err(ConfigError::EmptyExtension);
        }
        settings.extension = extension.to_string();

        tracing::debug!(?settings, root = %project_root, "loaded settings");
        Ok(settings)
    }
}
