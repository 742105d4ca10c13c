use std::collections::{
  BTreeMap,
  HashMap
};
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

use crate::availability::{
  BookingPolicy,
  SpacePolicies
};
use crate::slot::{
  Clock,
  hourly_slots
};

const RC_ENV_VAR: &str = "AGENDARC";
const RC_FILE_NAME: &str = ".agendarc";
const SPACE_PREFIX: &str = "space.";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    for (key, value) in [
      ("color", "on"),
      (
        "items.location",
        "~/.agenda/items.jsonl"
      ),
      ("availability.dense_threshold", "2"),
      ("availability.open", "08:00"),
      ("availability.close", "19:00"),
      ("availability.step", "60"),
    ] {
      map.insert(
        key.to_string(),
        value.to_string()
      );
    }

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    match locate_agendarc(rc_override) {
      | Some(path) => {
        info!(agendarc = %path.display(), "loading agendarc");
        cfg.load_file(&path, &mut Vec::new())?;
      }
      | None => {
        debug!(
          "no agendarc found; using \
           defaults"
        );
      }
    }

    Ok(cfg)
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
    for (key, value) in overrides {
      debug!(key = %key, value = %value, "applying override");
      self.map.insert(key, value);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  /// Booking policies: `availability.*`
  /// for the default, `space.<id>.*` per
  /// space on top of it.
  #[tracing::instrument(skip(self))]
  pub fn space_policies(
    &self
  ) -> anyhow::Result<SpacePolicies> {
    let default = self.policy_from(
      "availability",
      &BookingPolicy::default()
    )?;
    let mut policies =
      SpacePolicies::new(
        default.clone()
      );

    for id in self.space_ids() {
      let prefix =
        format!("{SPACE_PREFIX}{id}");
      let policy =
        self.policy_from(&prefix, &default)?;
      trace!(
        space = %id,
        slots = policy.candidate_slots.len(),
        dense = policy.dense_threshold,
        "space booking policy"
      );
      policies.insert(id, policy);
    }

    Ok(policies)
  }

  /// `space.<id>.name` display names.
  pub fn space_names(
    &self
  ) -> BTreeMap<String, String> {
    self
      .space_ids()
      .into_iter()
      .filter_map(|id| {
        let name = self.get(&format!(
          "{SPACE_PREFIX}{id}.name"
        ))?;
        Some((id, name))
      })
      .collect()
  }

  fn space_ids(&self) -> Vec<String> {
    let mut ids: Vec<String> = self
      .map
      .keys()
      .filter_map(|key| {
        let rest =
          key.strip_prefix(SPACE_PREFIX)?;
        let (id, _) =
          rest.rsplit_once('.')?;
        (!id.is_empty())
          .then(|| id.to_string())
      })
      .collect();
    ids.sort();
    ids.dedup();
    ids
  }

  fn policy_from(
    &self,
    prefix: &str,
    base: &BookingPolicy
  ) -> anyhow::Result<BookingPolicy> {
    let key =
      |field: &str| format!("{prefix}.{field}");

    let dense_threshold = match self
      .get(&key("dense_threshold"))
    {
      | Some(raw) => raw
        .trim()
        .parse::<usize>()
        .with_context(|| {
          format!(
            "invalid {}: {raw}",
            key("dense_threshold")
          )
        })?,
      | None => base.dense_threshold
    };

    let open = self.get(&key("open"));
    let close = self.get(&key("close"));
    let step = self.get(&key("step"));
    if open.is_none()
      && close.is_none()
      && step.is_none()
    {
      return Ok(BookingPolicy {
        dense_threshold,
        candidate_slots: base
          .candidate_slots
          .clone()
      });
    }

    let open = match open {
      | Some(raw) => parse_clock(&raw, &key("open"))?,
      | None => base
        .candidate_slots
        .first()
        .map(|slot| slot.start)
        .ok_or_else(|| {
          anyhow!("{} is required", key("open"))
        })?
    };
    let close = match close {
      | Some(raw) => parse_clock(&raw, &key("close"))?,
      | None => base
        .candidate_slots
        .last()
        .map(|slot| slot.end)
        .ok_or_else(|| {
          anyhow!("{} is required", key("close"))
        })?
    };
    let step = match step {
      | Some(raw) => raw
        .trim()
        .parse::<u32>()
        .with_context(|| {
          format!(
            "invalid {}: {raw}",
            key("step")
          )
        })?,
      | None => base
        .candidate_slots
        .first()
        .map(|slot| slot.duration_minutes())
        .unwrap_or(60)
    };

    let candidate_slots =
      hourly_slots(open, close, step)
        .with_context(|| {
          format!(
            "invalid slot window for {prefix}"
          )
        })?;

    Ok(BookingPolicy {
      dense_threshold,
      candidate_slots
    })
  }

  /// Reads one rc file into the map.
  /// `chain` holds the canonical paths of
  /// the files currently being read, so an
  /// include loop is caught.
  #[tracing::instrument(skip(self, chain))]
  fn load_file(
    &mut self,
    path: &Path,
    chain: &mut Vec<PathBuf>
  ) -> anyhow::Result<()> {
    let path = expand_home(path);
    let canonical = fs::canonicalize(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    if chain.contains(&canonical) {
      return Err(anyhow!(
        "include cycle: {} is already \
         being loaded",
        path.display()
      ));
    }

    let text =
      fs::read_to_string(&canonical)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;
    let base_dir = canonical
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_default();

    chain.push(canonical);
    self.loaded_files.push(path.clone());

    for (idx, raw) in
      text.lines().enumerate()
    {
      let line_no = idx + 1;
      let parsed = parse_rc_line(raw)
        .with_context(|| {
          format!(
            "invalid config line {}:{}",
            path.display(),
            line_no
          )
        })?;

      match parsed {
        | None => {}
        | Some(RcLine::Setting(
          key,
          value
        )) => {
          trace!(key, value, "loaded config key");
          self.map.insert(
            key.to_string(),
            value.to_string()
          );
        }
        | Some(RcLine::Include(target)) => {
          let target = base_dir.join(
            expand_home(Path::new(target))
          );
          if !target.is_file() {
            warn!(
              include = %target.display(),
              "include file does not exist; skipping"
            );
            continue;
          }
          debug!(
            from = %path.display(),
            line = line_no,
            include = %target.display(),
            "following include"
          );
          self
            .load_file(&target, chain)
            .with_context(|| {
              format!(
                "included from {}:{}",
                path.display(),
                line_no
              )
            })?;
        }
      }
    }

    chain.pop();
    Ok(())
  }
}

#[derive(Debug, PartialEq, Eq)]
enum RcLine<'a> {
  Include(&'a str),
  Setting(&'a str, &'a str)
}

/// `None` for blank and comment-only
/// lines.
fn parse_rc_line(
  raw: &str
) -> anyhow::Result<Option<RcLine<'_>>> {
  let line = raw
    .split_once('#')
    .map_or(raw, |(before, _)| before)
    .trim();
  if line.is_empty() {
    return Ok(None);
  }

  if let Some(target) =
    line.strip_prefix("include ")
  {
    return Ok(Some(RcLine::Include(
      target.trim()
    )));
  }

  match line.split_once('=') {
    | Some((key, value))
      if !key.trim().is_empty() =>
    {
      Ok(Some(RcLine::Setting(
        key.trim(),
        value.trim()
      )))
    }
    | _ => Err(anyhow!(
      "expected KEY = VALUE, got: {line}"
    ))
  }
}

/// Item file location: `--items`, then
/// `items.location`.
pub fn resolve_items_path(
  cfg: &Config,
  override_path: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let raw = match override_path {
    | Some(path) => path.to_path_buf(),
    | None => cfg
      .get("items.location")
      .map(PathBuf::from)
      .ok_or_else(|| {
        anyhow!(
          "items.location is not \
           configured"
        )
      })?
  };
  Ok(expand_home(&raw))
}

/// `--agendarc`, then `AGENDARC`
/// (`/dev/null` turns the file off), then
/// `~/.agendarc` when it exists.
fn locate_agendarc(
  explicit: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = explicit {
    return Some(path.to_path_buf());
  }

  match std::env::var_os(RC_ENV_VAR) {
    | Some(value) if value == "/dev/null" => {
      None
    }
    | Some(value) => {
      Some(PathBuf::from(value))
    }
    | None => dirs::home_dir()
      .map(|home| home.join(RC_FILE_NAME))
      .filter(|path| path.is_file())
  }
}

fn expand_home(path: &Path) -> PathBuf {
  match (
    path.strip_prefix("~"),
    dirs::home_dir()
  ) {
    | (Ok(rest), Some(home)) => {
      home.join(rest)
    }
    | _ => path.to_path_buf()
  }
}

fn parse_clock(
  raw: &str,
  key: &str
) -> anyhow::Result<Clock> {
  raw.parse::<Clock>().with_context(
    || format!("invalid {key}: {raw}")
  )
}
