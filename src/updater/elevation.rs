//! Elevated update path.
//!
//! When the application directory is not writable by the current user the update
//! cannot be applied in-process. Instead two scripts are generated into a
//! user-writable directory:
//!
//! - a **launcher** that asks the OS for administrator rights (UAC `runas` through a
//!   VBS shim on Windows, `pkexec` or `sudo` elsewhere) and runs the helper
//! - a **helper** that mirror-copies the configured trees and manifests from the
//!   shared drive into the install directory and relaunches the application
//!
//! The user confirms through an [`ElevationPrompt`] before the launcher is started.
//! Scripts are rendered with `tera`; paths pass through the `sh_quote` or
//! `win_path` filter depending on the flavor.

use anyhow::{Context as _, Result};
use colored::Colorize;
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use tracing::{debug, info};

use crate::utils::fs::atomic_write;

/// Answer to the elevation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevationChoice {
    Proceed,
    Cancel,
}

/// What the user is asked to approve.
#[derive(Debug, Clone)]
pub struct ElevationRequest {
    pub app_name: String,
    pub current_version: String,
    pub new_version: String,
    pub launcher: PathBuf,
}

impl ElevationRequest {
    pub fn message(&self) -> String {
        format!("{} needs administrator privileges to update.", self.app_name)
    }

    pub fn detail(&self) -> String {
        format!(
            "Updating from version {} to {}. Choose \"Update Now\" to run the update with \
             elevated permissions; the system may ask you to approve it.",
            self.current_version, self.new_version
        )
    }
}

/// Blocking user confirmation. Callers run it on the blocking pool.
pub trait ElevationPrompt: Send + Sync {
    fn confirm(&self, request: &ElevationRequest) -> ElevationChoice;
}

/// Asks on the terminal. Anything other than an empty answer or `y`/`yes` cancels,
/// as does a closed stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl ElevationPrompt for TerminalPrompt {
    fn confirm(&self, request: &ElevationRequest) -> ElevationChoice {
        println!("{}", "Administrator Privileges Required".yellow().bold());
        println!("{}", request.message());
        println!("{}", request.detail().dimmed());
        print!("Update Now? [Y/n] ");
        let _ = io::stdout().flush();

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => ElevationChoice::Cancel,
            Ok(_) => parse_answer(&answer),
        }
    }
}

fn parse_answer(answer: &str) -> ElevationChoice {
    match answer.trim().to_ascii_lowercase().as_str() {
        "" | "y" | "yes" => ElevationChoice::Proceed,
        _ => ElevationChoice::Cancel,
    }
}

/// Always gives the same answer. Used for `elevation = "always" | "never"` and in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedChoice(pub ElevationChoice);

impl ElevationPrompt for FixedChoice {
    fn confirm(&self, request: &ElevationRequest) -> ElevationChoice {
        debug!("Elevation prompt for {} answered with {:?}", request.app_name, self.0);
        self.0
    }
}

/// Script dialect to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFlavor {
    /// `.bat` scripts with a VBS `runas` shim and `robocopy /MIR`
    Batch,
    /// POSIX `sh` scripts using `pkexec`, falling back to `sudo`
    Shell,
}

impl ScriptFlavor {
    pub const fn native() -> Self {
        if cfg!(windows) { Self::Batch } else { Self::Shell }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            Self::Batch => "bat",
            Self::Shell => "sh",
        }
    }
}

/// Values substituted into the script templates.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptContext {
    pub app_name: String,
    pub current_version: String,
    pub new_version: String,
    pub source_path: PathBuf,
    pub dest_path: PathBuf,
    pub mirrored_dirs: Vec<String>,
    pub required_dirs: Vec<String>,
    pub manifest_files: Vec<String>,
    pub app_executable: PathBuf,
    pub restart_delay_secs: u64,
    /// Filled in by [`ElevationScripts::write`].
    pub helper_path: PathBuf,
}

/// Paths of the generated launcher and helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElevationScripts {
    pub launcher: PathBuf,
    pub helper: PathBuf,
}

impl ElevationScripts {
    /// Render both scripts and write them to `scripts_dir`.
    pub fn write(scripts_dir: &Path, flavor: ScriptFlavor, context: &ScriptContext) -> Result<Self> {
        let ext = flavor.extension();
        let launcher = scripts_dir.join(format!("update-launcher.{ext}"));
        let helper = scripts_dir.join(format!("update-helper.{ext}"));

        let mut context = context.clone();
        context.helper_path = helper.clone();
        let (launcher_body, helper_body) = render(flavor, &context)?;

        debug!("Source path for script: {}", context.source_path.display());
        debug!("Destination path for script: {}", context.dest_path.display());

        atomic_write(&helper, helper_body.as_bytes())?;
        atomic_write(&launcher, launcher_body.as_bytes())?;
        make_executable(&helper)?;
        make_executable(&launcher)?;

        info!("Wrote update scripts to {}", scripts_dir.display());
        Ok(Self {
            launcher,
            helper,
        })
    }
}

/// Render `(launcher, helper)` for the given flavor.
pub fn render(flavor: ScriptFlavor, context: &ScriptContext) -> Result<(String, String)> {
    let mut tera = Tera::default();
    tera.register_filter("sh_quote", sh_quote);
    tera.register_filter("win_path", win_path);
    tera.register_filter("bat_escape", bat_escape);
    tera.register_filter("bat_quoted", bat_quoted);

    let (launcher, helper) = match flavor {
        ScriptFlavor::Batch => (BATCH_LAUNCHER, BATCH_HELPER),
        ScriptFlavor::Shell => (SHELL_LAUNCHER, SHELL_HELPER),
    };
    tera.add_raw_templates(vec![("launcher", launcher), ("helper", helper)])
        .context("Failed to parse update script templates")?;

    let context = Context::from_serialize(context).context("Failed to build script context")?;
    let launcher = tera.render("launcher", &context).context("Failed to render update launcher")?;
    let helper = tera.render("helper", &context).context("Failed to render update helper")?;
    Ok((launcher, helper))
}

fn value_to_string(value: &tera::Value) -> String {
    match value {
        tera::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Single-quote a value for POSIX `sh`.
fn sh_quote(value: &tera::Value, _args: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
    let raw = value_to_string(value);
    Ok(tera::Value::String(format!("'{}'", raw.replace('\'', r"'\''"))))
}

/// Backslash path separators for batch files.
fn win_path(value: &tera::Value, _args: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
    Ok(tera::Value::String(value_to_string(value).replace('/', "\\")))
}

/// Escape a value for unquoted text in a batch file, such as `echo` and `title`.
fn bat_escape(value: &tera::Value, _args: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
    let raw = value_to_string(value);
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '^' | '&' | '|' | '<' | '>' | '(' | ')' => {
                escaped.push('^');
                escaped.push(c);
            }
            '%' => escaped.push_str("%%"),
            '\r' | '\n' => escaped.push(' '),
            _ => escaped.push(c),
        }
    }
    Ok(tera::Value::String(escaped))
}

/// Escape a value placed inside double quotes in a batch file.
///
/// Quotes already neutralize the operators, but `%` still expands. A `"` would end
/// the quoted section and cannot appear in a Windows path, so it is dropped.
fn bat_quoted(value: &tera::Value, _args: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
    let escaped = value_to_string(value)
        .chars()
        .filter(|c| *c != '"')
        .map(|c| match c {
            '\r' | '\n' => " ".to_string(),
            '%' => "%%".to_string(),
            _ => c.to_string(),
        })
        .collect();
    Ok(tera::Value::String(escaped))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .with_context(|| format!("Failed to mark {} executable", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

const SHELL_LAUNCHER: &str = r#"#!/bin/sh
# Requests administrator rights for the {{ app_name }} update helper.
echo 'Starting update of' {{ app_name | sh_quote }}
echo 'Requesting administrative privileges...'
if command -v pkexec >/dev/null 2>&1; then
  pkexec sh {{ helper_path | sh_quote }}
else
  sudo sh {{ helper_path | sh_quote }}
fi
status=$?
if [ "$status" -ne 0 ]; then
  echo 'UPDATE FAILED! Please try again or contact your system administrator.'
  exit "$status"
fi
echo 'The application will restart in {{ restart_delay_secs }} seconds...'
sleep {{ restart_delay_secs }}
{{ app_executable | sh_quote }} >/dev/null 2>&1 &
exit 0
"#;

const SHELL_HELPER: &str = r#"#!/bin/sh
# Applies the {{ app_name }} update with elevated rights.
SOURCE_PATH={{ source_path | sh_quote }}
DEST_PATH={{ dest_path | sh_quote }}

echo 'Updating' {{ app_name | sh_quote }} 'from version' {{ current_version | sh_quote }} 'to' {{ new_version | sh_quote }}

echo '[1/4] Checking directories...'
if [ ! -d "$DEST_PATH" ]; then
  echo 'ERROR: Application directory not found!'
  exit 1
fi

echo '[2/4] Accessing network location...'
if [ ! -d "$SOURCE_PATH" ]; then
  echo 'ERROR: Cannot access update source directory!'
  exit 1
fi
{% for dir in required_dirs %}
if [ ! -d "$SOURCE_PATH"/{{ dir | sh_quote }} ]; then
  echo 'ERROR: Source files not found!'
  exit 1
fi
{% endfor %}
echo '[3/4] Copying files...'
{% for dir in mirrored_dirs %}
if [ -d "$SOURCE_PATH"/{{ dir | sh_quote }} ]; then
  echo '- Copying' {{ dir | sh_quote }} 'folder...'
  rm -rf "$DEST_PATH"/{{ dir | sh_quote }} || exit 1
  cp -R "$SOURCE_PATH"/{{ dir | sh_quote }} "$DEST_PATH"/{{ dir | sh_quote }} || exit 1
fi
{% endfor %}
echo '[4/4] Copying configuration files...'
{% for file in manifest_files %}
if [ -f "$SOURCE_PATH"/{{ file | sh_quote }} ]; then
  cp "$SOURCE_PATH"/{{ file | sh_quote }} "$DEST_PATH"/{{ file | sh_quote }} || exit 1
fi
{% endfor %}
echo 'UPDATE SUCCESSFUL!'
exit 0
"#;

const BATCH_LAUNCHER: &str = r#"@echo off
echo Starting {{ app_name | bat_escape }} Update...

:: VBS shim that relaunches the helper through UAC
echo Set UAC = CreateObject("Shell.Application") > "%temp%\updater_elevate.vbs"
echo UAC.ShellExecute "{{ helper_path | win_path | bat_quoted }}", "", "", "runas", 1 >> "%temp%\updater_elevate.vbs"

echo Requesting administrative privileges...
call "%temp%\updater_elevate.vbs"
del "%temp%\updater_elevate.vbs"

echo Update process started with administrator privileges.
echo You may close this window.
timeout /t 5
exit
"#;

const BATCH_HELPER: &str = r#"@echo off
color 1F
title {{ app_name | bat_escape }} Administrator Update

echo ===================================================
echo               {{ app_name | bat_escape }} UPDATER
echo ===================================================
echo.
echo Updating {{ app_name | bat_escape }} from version {{ current_version | bat_escape }} to {{ new_version | bat_escape }}...
echo.

set "SOURCE_PATH={{ source_path | win_path | bat_quoted }}"
set "DEST_PATH={{ dest_path | win_path | bat_quoted }}"

echo [1/4] Checking directories...
echo Source: "%SOURCE_PATH%"
echo Destination: "%DEST_PATH%"
if not exist "%DEST_PATH%" (
  echo ERROR: Application directory not found!
  goto :error
)

echo [2/4] Accessing network location...
pushd "%SOURCE_PATH%"
if %ERRORLEVEL% NEQ 0 (
  echo ERROR: Cannot access update source directory!
  goto :error
)
{% for dir in required_dirs %}
if not exist "{{ dir | win_path | bat_quoted }}" (
  echo ERROR: Source files not found!
  popd
  goto :error
)
{% endfor %}
echo [3/4] Copying files...
{% for dir in mirrored_dirs %}
if exist "{{ dir | win_path | bat_quoted }}" (
  echo - Copying {{ dir | bat_escape }} folder...
  robocopy "{{ dir | win_path | bat_quoted }}" "%DEST_PATH%\{{ dir | win_path | bat_quoted }}" /MIR /NFL /NDL /NJH /NJS /NC /NS /MT:4
  if %ERRORLEVEL% GEQ 8 (
    echo ERROR: Failed to copy {{ dir | bat_escape }} folder! Error code: %ERRORLEVEL%
    popd
    goto :error
  )
)
{% endfor %}
echo [4/4] Copying configuration files...
{% for file in manifest_files %}
if exist "{{ file | bat_quoted }}" (
  copy "{{ file | bat_quoted }}" "%DEST_PATH%" /Y
)
{% endfor %}
popd

echo.
echo ===================================================
echo               UPDATE SUCCESSFUL!
echo ===================================================
echo The application will restart automatically in {{ restart_delay_secs }} seconds...
color 2F
timeout /t {{ restart_delay_secs }} /nobreak > nul

echo Restarting {{ app_name | bat_escape }}...
start "" "{{ app_executable | win_path | bat_quoted }}"
goto :end

:error
color 4F
echo.
echo ===================================================
echo                UPDATE FAILED!
echo ===================================================
echo An error occurred during the update process.
echo Please try again or contact your system administrator.
echo.

:end
pause
"#;
