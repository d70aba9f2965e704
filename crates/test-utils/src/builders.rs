#![allow(dead_code)]

use std::path::{Path, PathBuf};

use hotdeploy::config::{ConfigFile, RawConfigFile};
use hotdeploy::deploy::AppSettings;
use hotdeploy::types::AppId;
use hotdeploy::watch::ScanPattern;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.deploy.launch = "true".to_string();
        Self { config }
    }

    pub fn interval_seconds(mut self, seconds: i64) -> Self {
        self.config.scan.interval_seconds = Some(seconds);
        self
    }

    pub fn reload(mut self, mode: &str) -> Self {
        self.config.scan.reload = mode.to_string();
        self
    }

    pub fn settle_cycles(mut self, cycles: u32) -> Self {
        self.config.scan.settle_cycles = cycles;
        self
    }

    pub fn aggregated(mut self, excluded: &[&str]) -> Self {
        self.config.deploy.mode = "aggregated".to_string();
        self.config.deploy.excluded_apps = excluded.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn target(mut self, path: &str) -> Self {
        self.config.scan.targets.push(PathBuf::from(path));
        self
    }

    pub fn pattern(mut self, directory: &str, includes: &[&str]) -> Self {
        self.config.scan.patterns.push(ScanPattern {
            directory: PathBuf::from(directory),
            includes: includes.iter().map(|s| s.to_string()).collect(),
            excludes: Vec::new(),
        });
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `AppSettings` rooted at a web source directory.
pub struct AppSettingsBuilder {
    settings: AppSettings,
}

impl AppSettingsBuilder {
    /// `app` is `group:artifact`; the context path defaults to `/artifact`.
    pub fn new(app: &str, web_dir: impl AsRef<Path>) -> Self {
        let app_id = AppId::from(app);
        let web_dir = web_dir.as_ref().to_path_buf();
        Self {
            settings: AppSettings {
                context_path: format!("/{}", app_id.artifact()),
                app_id,
                web_dir: web_dir.clone(),
                descriptor: None,
                env_descriptors: Vec::new(),
                classes_dir: None,
                classpath: Vec::new(),
                base_resources: vec![web_dir],
                build_file: None,
            },
        }
    }

    pub fn context_path(mut self, path: &str) -> Self {
        self.settings.context_path = path.to_string();
        self
    }

    /// Use `WEB-INF/web.xml` under the web dir as descriptor.
    pub fn with_descriptor(mut self) -> Self {
        self.settings.descriptor = Some(self.settings.web_inf().join("web.xml"));
        self
    }

    pub fn env_descriptor(mut self, path: impl AsRef<Path>) -> Self {
        self.settings.env_descriptors.push(path.as_ref().to_path_buf());
        self
    }

    /// Use `WEB-INF/classes` under the web dir as class output.
    pub fn with_classes(mut self) -> Self {
        self.settings.classes_dir = Some(self.settings.web_inf().join("classes"));
        self
    }

    pub fn library(mut self, path: impl AsRef<Path>) -> Self {
        self.settings.classpath.push(path.as_ref().to_path_buf());
        self
    }

    pub fn build_file(mut self, path: impl AsRef<Path>) -> Self {
        self.settings.build_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn build(self) -> AppSettings {
        self.settings
    }
}

/// Builder for the TOML text of a build manifest.
#[derive(Default)]
pub struct ManifestBuilder {
    text: String,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a `[[project]]` table. `extra` lines are appended verbatim.
    pub fn project(mut self, group: &str, artifact: &str, packaging: &str, extra: &[&str]) -> Self {
        self.text.push_str(&format!(
            "[[project]]\ngroup_id = \"{group}\"\nartifact_id = \"{artifact}\"\nversion = \"1.0\"\npackaging = \"{packaging}\"\n"
        ));
        for line in extra {
            self.text.push_str(line);
            self.text.push('\n');
        }
        self.text.push('\n');
        self
    }

    /// Add a dependency to the most recent project.
    pub fn dependency(mut self, group: &str, artifact: &str, kind: &str, extra: &[&str]) -> Self {
        self.text.push_str(&format!(
            "[[project.dependency]]\ngroup_id = \"{group}\"\nartifact_id = \"{artifact}\"\nversion = \"1.0\"\ntype = \"{kind}\"\n"
        ));
        for line in extra {
            self.text.push_str(line);
            self.text.push('\n');
        }
        self.text.push('\n');
        self
    }

    pub fn build(self) -> String {
        self.text
    }
}
