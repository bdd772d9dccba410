// src/build/command.rs

//! Command lines for the compiler, the type checker and plugin hooks.

use crate::config::{BuildConfig, CommandTemplate};

/// A concrete program + arguments, ready to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

/// Default bundler invocation (esbuild).
pub fn default_compiler(dev: bool, use_externals: bool, use_aliases: bool) -> CommandTemplate {
    let mut args = vec![
        "{entry}".to_string(),
        "--bundle".to_string(),
        "--platform=node".to_string(),
        "--outfile={outfile}".to_string(),
        "--log-level=warning".to_string(),
    ];

    if dev {
        args.push("--sourcemap=inline".to_string());
    } else {
        args.push("--sourcemap".to_string());
        args.push("--minify".to_string());
    }
    if use_externals {
        args.push("--packages=external".to_string());
    }
    if use_aliases {
        args.push("--tsconfig={project}".to_string());
    }

    CommandTemplate {
        program: "esbuild".to_string(),
        args,
    }
}

/// Default decoupled type checker.
pub fn default_type_checker() -> CommandTemplate {
    CommandTemplate::new("tsc", ["--noEmit", "--pretty", "false", "-p", "{project}"])
}

/// Substitute the `{...}` placeholders of a template argument.
pub fn expand(template: &str, config: &BuildConfig) -> String {
    let vars = [
        ("{entry}", config.entry.display().to_string()),
        ("{outfile}", config.artifact_path().display().to_string()),
        ("{outdir}", config.output_dir.display().to_string()),
        ("{project}", config.project.display().to_string()),
        ("{mode}", config.mode_value().to_string()),
    ];

    vars.iter()
        .fold(template.to_string(), |acc, (key, value)| acc.replace(key, value))
}

impl CommandTemplate {
    pub fn render(&self, config: &BuildConfig) -> CommandLine {
        CommandLine {
            program: self.program.clone(),
            args: self.args.iter().map(|arg| expand(arg, config)).collect(),
        }
    }
}

pub fn compiler_command(config: &BuildConfig) -> CommandLine {
    config.compiler.render(config)
}

pub fn type_checker_command(config: &BuildConfig) -> CommandLine {
    config.type_checker.render(config)
}

/// Plugin hooks are shell snippets, run through the platform shell.
pub fn plugin_command(hook: &str, config: &BuildConfig) -> CommandLine {
    let script = expand(hook, config);
    if cfg!(windows) {
        CommandLine {
            program: "cmd".to_string(),
            args: vec!["/C".to_string(), script],
        }
    } else {
        CommandLine {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script],
        }
    }
}
