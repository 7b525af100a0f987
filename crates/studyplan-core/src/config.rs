use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::navigation::Granularity;

pub const CONFIG_ENV_VAR: &str =
  "STUDYPLAN_CONFIG";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    map.insert(
      "data.location".to_string(),
      "~/.studyplan".to_string()
    );
    map.insert(
      "view.default".to_string(),
      "daily".to_string()
    );
    map.insert(
      "color".to_string(),
      "on".to_string()
    );
    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let path = resolve_config_path(
      config_override
    )?;
    if let Some(path) = path {
      info!(config = %path.display(), "loading config");
      cfg.load_file(&path)?;
    } else {
      warn!(
        "no config file found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  /// Merges a TOML document on top of the
  /// current values. Nested tables become
  /// dotted keys.
  pub fn merge_toml_str(
    &mut self,
    text: &str
  ) -> anyhow::Result<()> {
    let table =
      toml::from_str::<toml::Table>(text)
      .context(
        "failed to parse config toml"
      )?;
    flatten_into(
      &mut self.map,
      "",
      &table
    );
    Ok(())
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  /// `None` when the key is unset or
  /// not a recognised boolean spelling.
  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .and_then(|v| parse_bool(v))
  }

  /// The `view.default` key, falling back
  /// to daily when it is unrecognised.
  pub fn default_granularity(
    &self
  ) -> Granularity {
    let Some(raw) =
      self.get("view.default")
    else {
      return Granularity::default();
    };
    raw.parse().unwrap_or_else(|err| {
      warn!(
        value = %raw,
        error = %err,
        "ignoring view.default"
      );
      Granularity::default()
    })
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .merge_toml_str(&text)
      .with_context(|| {
        format!(
          "invalid config file {}",
          path.display()
        )
      })?;
    self.loaded_files.push(path);

    Ok(())
  }
}

fn flatten_into(
  map: &mut HashMap<String, String>,
  prefix: &str,
  table: &toml::Table
) {
  for (k, value) in table {
    let key = if prefix.is_empty() {
      k.clone()
    } else {
      format!("{prefix}.{k}")
    };

    let rendered = match value {
      | toml::Value::Table(inner) => {
        flatten_into(map, &key, inner);
        continue;
      }
      | toml::Value::String(s) => {
        s.clone()
      }
      | toml::Value::Boolean(b) => {
        let flag =
          if *b { "on" } else { "off" };
        flag.to_string()
      }
      | toml::Value::Integer(i) => {
        i.to_string()
      }
      | toml::Value::Float(f) => {
        f.to_string()
      }
      | toml::Value::Datetime(dt) => {
        dt.to_string()
      }
      | toml::Value::Array(_) => {
        warn!(key = %key, "array config values are not supported; skipping");
        continue;
      }
    };

    trace!(key = %key, value = %rendered, "loaded config key");
    map.insert(key, rendered);
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_config_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(config_env) =
    std::env::var(CONFIG_ENV_VAR)
  {
    if config_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      config_env
    )));
  }

  let Some(config_dir) =
    dirs::config_dir()
  else {
    debug!(
      "no platform config directory"
    );
    return Ok(None);
  };
  let candidate = config_dir
    .join("studyplan")
    .join("config.toml");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".studyplan"))
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

pub fn parse_bool(
  s: &str
) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_present() {
    let cfg = Config::default();
    assert_eq!(
      cfg.get("data.location").as_deref(),
      Some("~/.studyplan")
    );
    assert_eq!(cfg.get_bool("color"), Some(true));
    assert_eq!(
      cfg.default_granularity(),
      Granularity::Daily
    );
  }

  #[test]
  fn toml_tables_flatten_to_dotted_keys() {
    let mut cfg = Config::default();
    cfg
      .merge_toml_str(
        r#"
color = false
timezone = "Europe/Madrid"

[view]
default = "monthly"

[data]
location = "/tmp/plans"
"#
      )
      .expect("valid toml");

    assert_eq!(cfg.get_bool("color"), Some(false));
    assert_eq!(
      cfg.get("timezone").as_deref(),
      Some("Europe/Madrid")
    );
    assert_eq!(
      cfg.default_granularity(),
      Granularity::Monthly
    );
    assert_eq!(
      cfg.get("data.location").as_deref(),
      Some("/tmp/plans")
    );
  }

  #[test]
  fn overrides_strip_rc_prefix() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![
      (
        "rc.view.default".to_string(),
        "weekly".to_string()
      ),
      (
        "color".to_string(),
        "off".to_string()
      ),
    ]);
    assert_eq!(
      cfg.default_granularity(),
      Granularity::Weekly
    );
    assert_eq!(cfg.get_bool("color"), Some(false));
  }

  #[test]
  fn unknown_default_view_falls_back() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![(
      "view.default".to_string(),
      "yearly".to_string()
    )]);
    assert_eq!(
      cfg.default_granularity(),
      Granularity::Daily
    );
  }

  #[test]
  fn boolean_spellings() {
    for raw in ["y", "Yes", " on ", "1", "TRUE"] {
      assert_eq!(parse_bool(raw), Some(true), "{raw}");
    }
    for raw in ["n", "no", "OFF", "0", "false"] {
      assert_eq!(parse_bool(raw), Some(false), "{raw}");
    }
    assert_eq!(parse_bool("sometimes"), None);

    let mut cfg = Config::default();
    cfg.apply_overrides(vec![(
      "color".to_string(),
      "sometimes".to_string()
    )]);
    assert_eq!(cfg.get_bool("color"), None);
  }

  #[test]
  fn rejects_malformed_toml() {
    let mut cfg = Config::default();
    assert!(
      cfg.merge_toml_str("color = ").is_err()
    );
  }

  #[test]
  fn loads_file_from_explicit_path() {
    let dir =
      tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(&path, "timezone = \"UTC\"\n")
      .expect("write config");

    let cfg = Config::load(Some(path.as_path()))
      .expect("load config");
    assert_eq!(
      cfg.get("timezone").as_deref(),
      Some("UTC")
    );
    assert_eq!(cfg.loaded_files, vec![path]);
  }
}
