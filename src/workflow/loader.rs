//! YAML workflow loading with include support.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::{Iterations, Loop, Region, Step, WorkflowItem};
use crate::error::{Result, TapdanceError};

/// Top-level shape of a workflow file.
#[derive(Debug, Deserialize)]
struct WorkflowFile {
    #[serde(default)]
    name: Option<String>,
    steps: Vec<serde_yaml::Value>,
}

/// Raw step fields as authored in YAML, before defaulting.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStep {
    name: String,
    find: String,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    threshold: Option<f64>,
    #[serde(default)]
    end_delay: Option<f64>,
    #[serde(default)]
    roi: Option<[i64; 4]>,
    #[serde(default)]
    offset: Option<[i32; 2]>,
    #[serde(default)]
    retries: Option<u32>,
    #[serde(default)]
    retry_delay: Option<f64>,
    #[serde(default)]
    start_delay: Option<f64>,
    #[serde(default)]
    verify_state_change: Option<bool>,
    #[serde(default)]
    verify_delay: Option<f64>,
    #[serde(default)]
    verify_retries: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLoop {
    #[serde(rename = "loop")]
    iterations: serde_yaml::Value,
    steps: Vec<serde_yaml::Value>,
    #[serde(default)]
    break_on_find: Option<String>,
    #[serde(default)]
    break_threshold: Option<f64>,
    #[serde(default)]
    iteration_delay: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawInclude {
    include: String,
}

/// Loads workflow files into [`WorkflowItem`] plans.
///
/// Relative include paths resolve against the directory of the file that
/// names them. Parsed files are cached so a workflow included twice is
/// read once.
pub struct WorkflowLoader {
    cache: HashMap<PathBuf, Vec<WorkflowItem>>,
}

impl WorkflowLoader {
    pub fn new() -> Self {
        Self { cache: HashMap::new() }
    }

    /// Load and validate the workflow at `path`.
    pub fn load(&mut self, path: &Path) -> Result<Vec<WorkflowItem>> {
        if let Some(items) = self.cache.get(path) {
            return Ok(items.clone());
        }
        if !path.is_file() {
            return Err(TapdanceError::WorkflowFileNotFound(path.to_path_buf()));
        }
        let file_label = path.display().to_string();
        let text = std::fs::read_to_string(path)?;
        let parsed: WorkflowFile =
            serde_yaml::from_str(&text).map_err(|e| TapdanceError::WorkflowSyntax {
                file: file_label.clone(),
                detail: e.to_string(),
            })?;

        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let items = self.convert_items(&parsed.steps, &base_dir, &file_label)?;
        tracing::info!(file = %file_label, items = items.len(), "Loaded workflow");
        self.cache.insert(path.to_path_buf(), items.clone());
        Ok(items)
    }

    /// Human-readable workflow name: the `name` field when present,
    /// otherwise the file stem.
    pub fn workflow_name(path: &Path) -> Result<String> {
        if !path.is_file() {
            return Err(TapdanceError::WorkflowFileNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let parsed: WorkflowFile =
            serde_yaml::from_str(&text).map_err(|e| TapdanceError::WorkflowSyntax {
                file: path.display().to_string(),
                detail: e.to_string(),
            })?;
        Ok(parsed.name.unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        }))
    }

    fn convert_items(
        &mut self,
        values: &[serde_yaml::Value],
        base_dir: &Path,
        file_label: &str,
    ) -> Result<Vec<WorkflowItem>> {
        let mut items = Vec::with_capacity(values.len());
        for (index, value) in values.iter().enumerate() {
            if !value.is_mapping() {
                return Err(TapdanceError::validation(
                    "Workflow entry must be a mapping",
                    Some(file_label),
                    Some(index),
                ));
            }

            if value.get("include").is_some() {
                let raw: RawInclude = deserialize(value.clone(), file_label, index)?;
                let target = base_dir.join(&raw.include);
                items.extend(self.load(&target)?);
            } else if value.get("loop").is_some() {
                let raw: RawLoop = deserialize(value.clone(), file_label, index)?;
                items.push(self.convert_loop(raw, base_dir, file_label, index)?);
            } else {
                let raw: RawStep = deserialize(value.clone(), file_label, index)?;
                items.push(WorkflowItem::Step(convert_step(raw, file_label, index)?));
            }
        }
        Ok(items)
    }

    fn convert_loop(
        &mut self,
        raw: RawLoop,
        base_dir: &Path,
        file_label: &str,
        index: usize,
    ) -> Result<WorkflowItem> {
        let iterations = parse_iterations(&raw.iterations, file_label, index)?;
        let body = self.convert_items(&raw.steps, base_dir, file_label)?;
        if body.is_empty() {
            return Err(TapdanceError::validation(
                "Loop body must contain at least one step",
                Some(file_label),
                Some(index),
            ));
        }

        let mut looped = Loop::new(iterations, body);
        if let Some(template_id) = raw.break_on_find {
            looped = looped.with_break_on_find(template_id);
        }
        if let Some(threshold) = raw.break_threshold {
            looped = looped.with_break_threshold(threshold)?;
        }
        if let Some(seconds) = raw.iteration_delay {
            looped = looped.with_iteration_delay_secs(seconds)?;
        }
        Ok(WorkflowItem::Loop(looped))
    }
}

impl Default for WorkflowLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn deserialize<T: serde::de::DeserializeOwned>(
    value: serde_yaml::Value,
    file_label: &str,
    index: usize,
) -> Result<T> {
    serde_yaml::from_value(value).map_err(|e| {
        TapdanceError::validation(e.to_string(), Some(file_label), Some(index))
    })
}

/// `loop: 5` runs five times; `loop: infinite` or `loop: -1` runs until
/// stopped or broken out of.
fn parse_iterations(
    value: &serde_yaml::Value,
    file_label: &str,
    index: usize,
) -> Result<Iterations> {
    match value {
        serde_yaml::Value::String(s) if s == "infinite" => Ok(Iterations::Infinite),
        serde_yaml::Value::Number(n) => match n.as_i64() {
            Some(-1) => Ok(Iterations::Infinite),
            Some(count) if count >= 0 && count <= i64::from(u32::MAX) => {
                Iterations::finite(count as u32).ok_or_else(|| {
                    TapdanceError::validation(
                        format!("Loop count must be positive or -1/'infinite', got {n}"),
                        Some(file_label),
                        Some(index),
                    )
                })
            }
            _ => Err(TapdanceError::validation(
                format!("Loop count must be positive or -1/'infinite', got {n}"),
                Some(file_label),
                Some(index),
            )),
        },
        other => Err(TapdanceError::validation(
            format!("Loop count must be a number or 'infinite', got {other:?}"),
            Some(file_label),
            Some(index),
        )),
    }
}

fn convert_step(raw: RawStep, file_label: &str, index: usize) -> Result<Step> {
    let mut builder = Step::builder().name(raw.name).find(raw.find);
    if let Some(action) = raw.action {
        builder = builder.action(action);
    }
    if let Some(threshold) = raw.threshold {
        builder = builder.threshold(threshold)?;
    }
    if let Some(seconds) = raw.end_delay {
        builder = builder.end_delay_secs(seconds)?;
    }
    if let Some([x, y, w, h]) = raw.roi {
        let (x, y) = (clamp_coord(x), clamp_coord(y));
        let width = u32::try_from(w).map_err(|_| TapdanceError::InvalidRegion { width: w, height: h })?;
        let height =
            u32::try_from(h).map_err(|_| TapdanceError::InvalidRegion { width: w, height: h })?;
        builder = builder.roi(Region::new(x, y, width, height)?);
    }
    if let Some([x, y]) = raw.offset {
        builder = builder.offset(x, y);
    }
    if let Some(retries) = raw.retries {
        builder = builder.retries(retries);
    }
    if let Some(seconds) = raw.retry_delay {
        builder = builder.retry_delay_secs(seconds)?;
    }
    if let Some(seconds) = raw.start_delay {
        builder = builder.start_delay_secs(seconds)?;
    }
    if let Some(verify) = raw.verify_state_change {
        builder = builder.verify_state_change(verify);
    }
    if let Some(seconds) = raw.verify_delay {
        builder = builder.verify_delay_secs(seconds)?;
    }
    if let Some(retries) = raw.verify_retries {
        builder = builder.verify_retries(retries);
    }
    builder.build().map_err(|e| match e {
        TapdanceError::InvalidStep(message) => {
            TapdanceError::validation(message, Some(file_label), Some(index))
        }
        other => other,
    })
}

fn clamp_coord(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Position;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_simple_step() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "plan.yaml",
            "name: Daily chores\nsteps:\n  - name: Tap OK\n    find: ok.png\n",
        );

        let items = WorkflowLoader::new().load(&path).unwrap();
        assert_eq!(items.len(), 1);
        let WorkflowItem::Step(step) = &items[0] else {
            panic!("expected a step");
        };
        assert_eq!(step.name, "Tap OK");
        assert_eq!(step.find, "ok.png");
        assert_eq!(step.action, "click");
    }

    #[test]
    fn test_load_full_step_fields() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "plan.yaml",
            concat!(
                "steps:\n",
                "  - name: Open chest\n",
                "    find: chest.png\n",
                "    action: double_click\n",
                "    threshold: 0.85\n",
                "    roi: [10, 20, 300, 200]\n",
                "    offset: [5, -3]\n",
                "    retries: 4\n",
                "    retry_delay: 0.5\n",
                "    verify_state_change: true\n",
            ),
        );

        let items = WorkflowLoader::new().load(&path).unwrap();
        let WorkflowItem::Step(step) = &items[0] else {
            panic!("expected a step");
        };
        assert_eq!(step.action, "double_click");
        assert_eq!(step.threshold, 0.85);
        assert_eq!(step.roi.as_ref().unwrap().width(), 300);
        assert_eq!(step.offset, Position::new(5, -3));
        assert_eq!(step.retries, 4);
        assert_eq!(step.retry_delay, Duration::from_millis(500));
        assert!(step.verify_state_change);
    }

    #[test]
    fn test_load_loop() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "plan.yaml",
            concat!(
                "steps:\n",
                "  - loop: 3\n",
                "    break_on_find: done.png\n",
                "    iteration_delay: 1.5\n",
                "    steps:\n",
                "      - name: Farm\n",
                "        find: farm.png\n",
            ),
        );

        let items = WorkflowLoader::new().load(&path).unwrap();
        let WorkflowItem::Loop(looped) = &items[0] else {
            panic!("expected a loop");
        };
        assert_eq!(looped.iterations, Iterations::finite(3).unwrap());
        assert_eq!(looped.break_on_find.as_deref(), Some("done.png"));
        assert_eq!(looped.iteration_delay, Duration::from_millis(1500));
        assert_eq!(looped.steps.len(), 1);
    }

    #[test]
    fn test_infinite_loop_spellings() {
        let dir = TempDir::new().unwrap();
        for spelling in ["infinite", "-1"] {
            let path = write(
                &dir,
                &format!("plan-{spelling}.yaml"),
                &format!(
                    "steps:\n  - loop: {spelling}\n    steps:\n      - name: A\n        find: a.png\n"
                ),
            );
            let items = WorkflowLoader::new().load(&path).unwrap();
            let WorkflowItem::Loop(looped) = &items[0] else {
                panic!("expected a loop");
            };
            assert!(looped.is_infinite());
        }
    }

    #[test]
    fn test_include_splices_items() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "common.yaml",
            "steps:\n  - name: Login\n    find: login.png\n",
        );
        let path = write(
            &dir,
            "plan.yaml",
            concat!(
                "steps:\n",
                "  - include: common.yaml\n",
                "  - name: Play\n",
                "    find: play.png\n",
            ),
        );

        let items = WorkflowLoader::new().load(&path).unwrap();
        assert_eq!(items.len(), 2);
        let WorkflowItem::Step(first) = &items[0] else {
            panic!("expected a step");
        };
        assert_eq!(first.name, "Login");
    }

    #[test]
    fn test_missing_file() {
        let err = WorkflowLoader::new()
            .load(Path::new("/nonexistent/plan.yaml"))
            .unwrap_err();
        assert!(matches!(err, TapdanceError::WorkflowFileNotFound(_)));
    }

    #[test]
    fn test_invalid_yaml_syntax() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "plan.yaml", "steps: [unclosed\n");
        let err = WorkflowLoader::new().load(&path).unwrap_err();
        assert!(matches!(err, TapdanceError::WorkflowSyntax { .. }));
    }

    #[test]
    fn test_step_missing_find_field() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "plan.yaml", "steps:\n  - name: Broken\n");
        let err = WorkflowLoader::new().load(&path).unwrap_err();
        assert!(matches!(err, TapdanceError::WorkflowValidation { .. }));
        assert!(err.to_string().contains("step 0"));
    }

    #[test]
    fn test_empty_loop_body_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "plan.yaml", "steps:\n  - loop: 2\n    steps: []\n");
        let err = WorkflowLoader::new().load(&path).unwrap_err();
        assert!(err.to_string().contains("at least one step"));
    }

    #[test]
    fn test_zero_loop_count_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "plan.yaml",
            "steps:\n  - loop: 0\n    steps:\n      - name: A\n        find: a.png\n",
        );
        let err = WorkflowLoader::new().load(&path).unwrap_err();
        assert!(err.to_string().contains("Loop count"));
    }

    #[test]
    fn test_unknown_step_field_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "plan.yaml",
            "steps:\n  - name: A\n    find: a.png\n    treshold: 0.5\n",
        );
        let err = WorkflowLoader::new().load(&path).unwrap_err();
        assert!(matches!(err, TapdanceError::WorkflowValidation { .. }));
    }

    #[test]
    fn test_workflow_name_field_and_fallback() {
        let dir = TempDir::new().unwrap();
        let named = write(&dir, "a.yaml", "name: Morning routine\nsteps: []\n");
        let unnamed = write(&dir, "evening.yaml", "steps: []\n");
        assert_eq!(WorkflowLoader::workflow_name(&named).unwrap(), "Morning routine");
        assert_eq!(WorkflowLoader::workflow_name(&unnamed).unwrap(), "evening");
    }

    #[test]
    fn test_workflow_name_missing_file() {
        let err = WorkflowLoader::workflow_name(Path::new("/nonexistent/plan.yaml")).unwrap_err();
        assert!(matches!(err, TapdanceError::WorkflowFileNotFound(_)));
    }
}
