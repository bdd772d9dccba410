#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tsrun::config::{BuildConfig, CommandTemplate, CompileOptions, WatchSettings};

/// Builder for `BuildConfig` to simplify test setup.
///
/// Defaults run the artifact with `sh`, so tests write shell scripts as
/// "compiled" artifacts.
pub struct BuildConfigBuilder {
    config: BuildConfig,
}

impl BuildConfigBuilder {
    pub fn new(root: &Path) -> Self {
        let output_dir = root.join("dist");
        Self {
            config: BuildConfig {
                entry: root.join("src/index.ts"),
                output_dir: output_dir.clone(),
                output_file: "index.js".to_string(),
                dev: true,
                check_types: false,
                use_aliases: false,
                use_externals: true,
                project: root.join("tsconfig.json"),
                plugins: vec![],
                compiler: CommandTemplate::new("true", Vec::<String>::new()),
                type_checker: CommandTemplate::new("true", Vec::<String>::new()),
                runtime: "sh".to_string(),
                mode_variable: "NODE_ENV".to_string(),
                env: BTreeMap::new(),
                watch: WatchSettings {
                    root: root.to_path_buf(),
                    ignore: vec![],
                    debounce: Duration::from_millis(50),
                },
            },
        }
    }

    pub fn output_file(mut self, name: &str) -> Self {
        self.config.output_file = name.to_string();
        self
    }

    pub fn runtime(mut self, program: &str) -> Self {
        self.config.runtime = program.to_string();
        self
    }

    /// Compiler run through `sh -c <script>`.
    pub fn compiler_script(mut self, script: &str) -> Self {
        self.config.compiler = CommandTemplate::new("sh", ["-c", script]);
        self
    }

    pub fn compiler(mut self, program: &str) -> Self {
        self.config.compiler = CommandTemplate::new(program, Vec::<String>::new());
        self
    }

    /// Type checker run through `sh -c <script>`; enables type checking.
    pub fn type_checker_script(mut self, script: &str) -> Self {
        self.config.type_checker = CommandTemplate::new("sh", ["-c", script]);
        self.config.check_types = true;
        self
    }

    pub fn check_types(mut self, val: bool) -> Self {
        self.config.check_types = val;
        self
    }

    pub fn dev(mut self, val: bool) -> Self {
        self.config.dev = val;
        self
    }

    pub fn plugin(mut self, hook: &str) -> Self {
        self.config.plugins.push(hook.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.config.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> BuildConfig {
        fs::create_dir_all(&self.config.output_dir).expect("create output dir");
        self.config
    }
}

/// Write an executable-by-`sh` script to `path`, creating parent directories.
pub fn write_script(path: &Path, body: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create script dir");
    }
    fs::write(path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    path.to_path_buf()
}

/// A throwaway TypeScript project on disk.
pub struct ProjectFixture {
    dir: TempDir,
}

impl ProjectFixture {
    /// Empty `tsconfig.json` plus `src/index.ts`.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp project");
        let fixture = Self { dir };
        fixture.write("tsconfig.json", "{}");
        fixture.write("src/index.ts", "console.log('Basics');\n");
        fixture
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture dir");
        }
        fs::write(&path, contents).expect("write fixture file");
        path
    }

    /// Options compiling `src/index.ts` into `dist/index.js`.
    pub fn options(&self) -> CompileOptions {
        CompileOptions {
            output: Some(PathBuf::from("dist/index.js")),
            ..CompileOptions::new("src/index.ts")
        }
    }

    /// A `BuildConfigBuilder` rooted in this project.
    pub fn config(&self) -> BuildConfigBuilder {
        BuildConfigBuilder::new(self.root())
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}
