//! Task declaration and manifest generation.
//!
//! A [`Task`] accumulates rule and build-edge declarations and renders them
//! into one manifest. Rules are command-template producers resolved against
//! a configuration tree; build generators yield edge descriptors, eagerly
//! or lazily, which are normalized and serialized in production order.
//!
//! # Flow
//!
//! [`Task::generate`]:
//! 1. Runs every rule producer in declaration order, expands its
//!    `{cfg.*}` placeholders, and emits a rule block.
//! 2. Runs every build generator in declaration order, consumes its full
//!    edge sequence exactly once, normalizes each descriptor, and emits a
//!    build block per edge.
//! 3. Emits any pool, include, subninja, and default declarations around
//!    the rule and build sections.
//!
//! Generation is synchronous and buffered; the manifest comes back as one
//! `String` and writing it anywhere is the caller's concern.

use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::syntax::{ManifestWriter, RuleOptions, SyntaxError};
use crate::template::{self, ResolveMode, TemplateError};
use crate::writer::DEFAULT_WIDTH;

/// Declaration-time errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclareError {
  #[error("rule '{name}' is already declared in task '{task}'")]
  DuplicateRule { name: String, task: String },
}

/// Generation-time errors. All abort generation immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
  #[error("build edge {output:?} references unknown rule '{rule}'")]
  UnknownRule { rule: String, output: String },

  #[error("build edge for rule '{rule}' declares no outputs")]
  EmptyOutputs { rule: String },

  #[error(transparent)]
  Template(#[from] TemplateError),

  #[error(transparent)]
  Syntax(#[from] SyntaxError),
}

/// Knobs for a single generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateOptions {
  /// Column width for line wrapping.
  pub width: usize,
  /// How unresolved `{cfg.*}` references are handled.
  pub resolve: ResolveMode,
}

impl Default for GenerateOptions {
  fn default() -> Self {
    Self { width: DEFAULT_WIDTH, resolve: ResolveMode::Strict }
  }
}

/// Conversion of scalar-or-list path arguments into an ordered list.
///
/// A single path becomes a singleton list; list-shaped arguments pass
/// through preserving order.
pub trait IntoPaths {
  fn into_paths(self) -> Vec<String>;
}

impl IntoPaths for &str {
  fn into_paths(self) -> Vec<String> {
    vec![self.to_string()]
  }
}

impl IntoPaths for String {
  fn into_paths(self) -> Vec<String> {
    vec![self]
  }
}

impl IntoPaths for Vec<String> {
  fn into_paths(self) -> Vec<String> {
    self
  }
}

impl IntoPaths for Vec<&str> {
  fn into_paths(self) -> Vec<String> {
    self.into_iter().map(str::to_string).collect()
  }
}

impl IntoPaths for &[&str] {
  fn into_paths(self) -> Vec<String> {
    self.iter().map(|s| s.to_string()).collect()
  }
}

impl<const N: usize> IntoPaths for [&str; N] {
  fn into_paths(self) -> Vec<String> {
    self.iter().map(|s| s.to_string()).collect()
  }
}

/// The empty path list.
impl IntoPaths for () {
  fn into_paths(self) -> Vec<String> {
    Vec::new()
  }
}

/// Conversion of key/value collections into per-edge variable lists.
pub trait IntoVars {
  fn into_vars(self) -> Vec<(String, String)>;
}

impl<K: Into<String>, V: Into<String>> IntoVars for Vec<(K, V)> {
  fn into_vars(self) -> Vec<(String, String)> {
    self.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
  }
}

impl<K: Into<String>, V: Into<String>, const N: usize> IntoVars for [(K, V); N] {
  fn into_vars(self) -> Vec<(String, String)> {
    self.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
  }
}

/// One build-edge descriptor.
///
/// Constructed either positionally, from tuples of arity 2 through 6
/// (outputs, rule, inputs, implicit, order-only, variables), or keyed,
/// through [`EdgeSpec::new`] and the builder methods. Both shapes end up in
/// the same normalized descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeSpec {
  pub outputs: Vec<String>,
  pub rule: String,
  pub inputs: Vec<String>,
  pub implicit: Vec<String>,
  pub order_only: Vec<String>,
  pub vars: Vec<(String, String)>,
}

impl EdgeSpec {
  pub fn new(outputs: impl IntoPaths, rule: impl Into<String>) -> Self {
    Self { outputs: outputs.into_paths(), rule: rule.into(), ..Self::default() }
  }

  pub fn inputs(mut self, paths: impl IntoPaths) -> Self {
    self.inputs = paths.into_paths();
    self
  }

  pub fn implicit(mut self, paths: impl IntoPaths) -> Self {
    self.implicit = paths.into_paths();
    self
  }

  pub fn order_only(mut self, paths: impl IntoPaths) -> Self {
    self.order_only = paths.into_paths();
    self
  }

  /// Set one per-edge variable. Re-setting a key replaces its value in
  /// place, keeping the original position (last write wins).
  pub fn var(mut self, key: &str, value: &str) -> Self {
    insert_var(&mut self.vars, key, value);
    self
  }

  /// Merge a collection of per-edge variables, with the same last-write-wins
  /// policy as [`EdgeSpec::var`].
  pub fn vars(mut self, vars: impl IntoVars) -> Self {
    for (key, value) in vars.into_vars() {
      insert_var(&mut self.vars, &key, &value);
    }
    self
  }
}

fn insert_var(vars: &mut Vec<(String, String)>, key: &str, value: &str) {
  if let Some(slot) = vars.iter_mut().find(|(k, _)| k == key) {
    slot.1 = value.to_string();
  } else {
    vars.push((key.to_string(), value.to_string()));
  }
}

impl<O: IntoPaths, R: Into<String>> From<(O, R)> for EdgeSpec {
  fn from((outputs, rule): (O, R)) -> Self {
    EdgeSpec::new(outputs, rule)
  }
}

impl<O: IntoPaths, R: Into<String>, I: IntoPaths> From<(O, R, I)> for EdgeSpec {
  fn from((outputs, rule, inputs): (O, R, I)) -> Self {
    EdgeSpec::new(outputs, rule).inputs(inputs)
  }
}

impl<O: IntoPaths, R: Into<String>, I: IntoPaths, M: IntoPaths> From<(O, R, I, M)> for EdgeSpec {
  fn from((outputs, rule, inputs, implicit): (O, R, I, M)) -> Self {
    EdgeSpec::new(outputs, rule).inputs(inputs).implicit(implicit)
  }
}

impl<O: IntoPaths, R: Into<String>, I: IntoPaths, M: IntoPaths, Q: IntoPaths> From<(O, R, I, M, Q)>
  for EdgeSpec
{
  fn from((outputs, rule, inputs, implicit, order_only): (O, R, I, M, Q)) -> Self {
    EdgeSpec::new(outputs, rule).inputs(inputs).implicit(implicit).order_only(order_only)
  }
}

impl<O: IntoPaths, R: Into<String>, I: IntoPaths, M: IntoPaths, Q: IntoPaths, V: IntoVars>
  From<(O, R, I, M, Q, V)> for EdgeSpec
{
  fn from((outputs, rule, inputs, implicit, order_only, vars): (O, R, I, M, Q, V)) -> Self {
    EdgeSpec::new(outputs, rule)
      .inputs(inputs)
      .implicit(implicit)
      .order_only(order_only)
      .vars(vars)
  }
}

type RuleProducer = Box<dyn Fn(&Config) -> String>;
type EdgeProducer = Box<dyn Fn(&Config) -> Vec<EdgeSpec>>;

struct Rule {
  name: String,
  produce: RuleProducer,
  options: RuleOptions,
}

/// A named collection of rule and build-edge declarations that together
/// produce one manifest. The empty name marks the default task.
pub struct Task {
  name: String,
  rules: Vec<Rule>,
  builds: Vec<EdgeProducer>,
  pools: Vec<(String, u32)>,
  includes: Vec<String>,
  subninjas: Vec<String>,
  defaults: Vec<String>,
}

impl Task {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      rules: Vec::new(),
      builds: Vec::new(),
      pools: Vec::new(),
      includes: Vec::new(),
      subninjas: Vec::new(),
      defaults: Vec::new(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Whether this is the task used when no task is explicitly selected.
  pub fn is_default(&self) -> bool {
    self.name.is_empty()
  }

  /// Declare a rule with no extra attributes.
  ///
  /// # Errors
  ///
  /// Returns [`DeclareError::DuplicateRule`] if a rule with this name is
  /// already declared in this task.
  pub fn rule<F>(&mut self, name: &str, produce: F) -> Result<(), DeclareError>
  where
    F: Fn(&Config) -> String + 'static,
  {
    self.rule_with(name, RuleOptions::new(), produce)
  }

  /// Declare a rule with attributes. Equivalent to [`Task::rule`] plus
  /// options; both append to the same ordered rule list.
  pub fn rule_with<F>(&mut self, name: &str, options: RuleOptions, produce: F) -> Result<(), DeclareError>
  where
    F: Fn(&Config) -> String + 'static,
  {
    if self.rules.iter().any(|rule| rule.name == name) {
      return Err(DeclareError::DuplicateRule { name: name.to_string(), task: self.name.clone() });
    }
    self.rules.push(Rule {
      name: name.to_string(),
      produce: Box::new(produce),
      options,
    });
    Ok(())
  }

  /// Declare a build-edge generator.
  ///
  /// The generator may return an eager collection or a lazy iterator; the
  /// produced sequence is consumed fully, exactly once, during each
  /// generation run.
  pub fn build<F, I>(&mut self, produce: F)
  where
    F: Fn(&Config) -> I + 'static,
    I: IntoIterator,
    I::Item: Into<EdgeSpec>,
  {
    self
      .builds
      .push(Box::new(move |config| produce(config).into_iter().map(Into::into).collect()));
  }

  /// Declare a pool with the given depth.
  pub fn pool(&mut self, name: &str, depth: u32) {
    self.pools.push((name.to_string(), depth));
  }

  /// Include another manifest's declarations into this scope.
  pub fn include(&mut self, path: &str) {
    self.includes.push(path.to_string());
  }

  /// Reference another manifest in its own variable scope.
  pub fn subninja(&mut self, path: &str) {
    self.subninjas.push(path.to_string());
  }

  /// Append default targets.
  pub fn defaults(&mut self, targets: impl IntoPaths) {
    self.defaults.extend(targets.into_paths());
  }

  /// Generate the manifest with default options (width 78, strict
  /// placeholder resolution).
  pub fn generate(&self, config: &mut Config) -> Result<String, GenerateError> {
    self.generate_with(config, GenerateOptions::default())
  }

  /// Generate the manifest.
  ///
  /// # Errors
  ///
  /// Fails on an unresolved `{cfg.*}` reference (strict mode), an edge with
  /// no outputs or an unknown rule name, or a value embedding a raw
  /// newline. The first failure aborts the run.
  pub fn generate_with(&self, config: &mut Config, options: GenerateOptions) -> Result<String, GenerateError> {
    debug!(task = %self.name, rules = self.rules.len(), generators = self.builds.len(), "generating manifest");
    let mut writer = ManifestWriter::with_width(options.width);

    if !self.includes.is_empty() {
      for path in &self.includes {
        writer.include(path)?;
      }
      writer.newline();
    }

    for (name, depth) in &self.pools {
      writer.pool(name, *depth)?;
      writer.newline();
    }

    for rule in &self.rules {
      let raw = (rule.produce)(config);
      let command = template::expand(&raw, config, options.resolve)?;
      writer.rule(&rule.name, &command, &rule.options)?;
      writer.newline();
    }

    let mut edges = 0usize;
    for produce in &self.builds {
      for spec in produce(config) {
        let spec = self.normalize(spec)?;
        writer.build(&spec.outputs, &spec.rule, &spec.inputs, &spec.implicit, &spec.order_only, &spec.vars)?;
        edges += 1;
      }
    }

    if !self.subninjas.is_empty() {
      writer.newline();
      for path in &self.subninjas {
        writer.subninja(path)?;
      }
    }

    if !self.defaults.is_empty() {
      writer.newline();
      writer.defaults(&self.defaults)?;
    }

    info!(task = %self.name, rules = self.rules.len(), edges, "manifest generated");
    Ok(writer.finish())
  }

  fn normalize(&self, spec: EdgeSpec) -> Result<EdgeSpec, GenerateError> {
    if spec.outputs.is_empty() {
      return Err(GenerateError::EmptyOutputs { rule: spec.rule });
    }
    if !self.rules.iter().any(|rule| rule.name == spec.rule) {
      return Err(GenerateError::UnknownRule {
        rule: spec.rule.clone(),
        output: spec.outputs[0].clone(),
      });
    }
    Ok(spec)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{ConfigRegistry, Node};

  #[test]
  fn minimal_rule_and_edge_render_exactly() {
    let mut task = Task::new("build_luajit");
    task.rule("cc", |_| "cl /c /Fo$out $in".to_string()).unwrap();
    task.build(|_| vec![("minilua.obj", "cc", "host/minilua.c")]);

    let mut config = Config::new();
    let manifest = task.generate(&mut config).unwrap();
    assert_eq!(
      manifest,
      "rule cc\n  command = cl /c /Fo$out $in\n\nbuild minilua.obj: cc host/minilua.c\n"
    );
  }

  #[test]
  fn positional_and_keyed_edges_are_equivalent() {
    let mut positional = Task::new("");
    positional.rule("cc", |_| "cc -c -o $out $in".to_string()).unwrap();
    positional.build(|_| vec![("a.o", "cc", "a.c", "gen.h", "dir.stamp", [("flags", "-O2")])]);

    let mut keyed = Task::new("");
    keyed.rule("cc", |_| "cc -c -o $out $in".to_string()).unwrap();
    keyed.build(|_| {
      vec![
        EdgeSpec::new("a.o", "cc")
          .inputs("a.c")
          .implicit("gen.h")
          .order_only("dir.stamp")
          .var("flags", "-O2"),
      ]
    });

    let mut config_a = Config::new();
    let mut config_b = Config::new();
    assert_eq!(positional.generate(&mut config_a).unwrap(), keyed.generate(&mut config_b).unwrap());
  }

  #[test]
  fn later_variable_write_wins_in_place() {
    let spec = EdgeSpec::new("a.o", "cc")
      .var("flags", "-O0")
      .var("pdb", "a.pdb")
      .vars([("flags", "-O2")]);
    assert_eq!(
      spec.vars,
      vec![("flags".to_string(), "-O2".to_string()), ("pdb".to_string(), "a.pdb".to_string())]
    );
  }

  #[test]
  fn scalar_fields_normalize_to_singleton_lists() {
    let spec = EdgeSpec::from(("out.o", "cc", "in.c"));
    assert_eq!(spec.outputs, vec!["out.o".to_string()]);
    assert_eq!(spec.inputs, vec!["in.c".to_string()]);
    assert!(spec.implicit.is_empty());
  }

  #[test]
  fn lazy_generators_are_consumed_once_per_run() {
    let mut task = Task::new("");
    task.rule("cc", |_| "cc -c -o $out $in".to_string()).unwrap();
    task.build(|_| {
      ["aux", "base"]
        .into_iter()
        .map(|name| (format!("{name}.o"), "cc", format!("src/{name}.c")))
    });

    let mut config = Config::new();
    let manifest = task.generate(&mut config).unwrap();
    assert!(manifest.contains("build aux.o: cc src/aux.c\n"));
    assert!(manifest.contains("build base.o: cc src/base.c\n"));
  }

  #[test]
  fn duplicate_rule_in_one_task_is_a_declaration_error() {
    let mut task = Task::new("host");
    task.rule("cc", |_| "cc $in".to_string()).unwrap();
    let err = task.rule("cc", |_| "clang $in".to_string()).unwrap_err();
    assert_eq!(
      err,
      DeclareError::DuplicateRule { name: "cc".to_string(), task: "host".to_string() }
    );
  }

  #[test]
  fn same_rule_name_in_two_tasks_does_not_conflict() {
    let mut host = Task::new("host");
    let mut target = Task::new("target");
    host.rule("cc", |_| "cc $in".to_string()).unwrap();
    target.rule("cc", |_| "cl $in".to_string()).unwrap();
  }

  #[test]
  fn unknown_rule_reference_fails_and_produces_no_output() {
    let mut task = Task::new("");
    task.rule("cc", |_| "cc $in".to_string()).unwrap();
    task.build(|_| vec![("a.o", "nope", "a.c")]);

    let mut config = Config::new();
    let err = task.generate(&mut config).unwrap_err();
    assert_eq!(err, GenerateError::UnknownRule { rule: "nope".to_string(), output: "a.o".to_string() });
  }

  #[test]
  fn edge_without_outputs_fails() {
    let mut task = Task::new("");
    task.rule("cc", |_| "cc $in".to_string()).unwrap();
    task.build(|_| vec![EdgeSpec::new((), "cc").inputs("a.c")]);

    let mut config = Config::new();
    let err = task.generate(&mut config).unwrap_err();
    assert_eq!(err, GenerateError::EmptyOutputs { rule: "cc".to_string() });
  }

  #[test]
  fn outputs_with_spaces_are_escaped() {
    let mut task = Task::new("");
    task.rule("cc", |_| "cc $in".to_string()).unwrap();
    task.build(|_| vec![("my file.obj", "cc", "a.c")]);

    let mut config = Config::new();
    let manifest = task.generate(&mut config).unwrap();
    assert!(manifest.contains("build my$ file.obj: cc a.c\n"));
  }

  #[test]
  fn command_templates_resolve_against_registry_config() {
    let mut registry = ConfigRegistry::new();
    registry.register(|config| {
      config.set("cc.exe", "cl");
      config.set("cc.flags", "/nologo");
    });

    let mut task = Task::new("");
    task.rule("cc", |_| "{cfg.cc.exe} {cfg.cc.flags} /c /Fo$out $in".to_string()).unwrap();
    task.build(|_| vec![("a.obj", "cc", "a.c")]);

    let mut config = registry.run();
    let manifest = task.generate(&mut config).unwrap();
    assert!(manifest.contains("  command = cl /nologo /c /Fo$out $in\n"));
  }

  #[test]
  fn strict_resolution_aborts_on_missing_reference() {
    let mut task = Task::new("");
    task.rule("cc", |_| "{cfg.cc.exe} /c $in".to_string()).unwrap();

    let mut config = Config::new();
    let err = task.generate(&mut config).unwrap_err();
    assert_eq!(err, GenerateError::Template(TemplateError::Unresolved("cc.exe".to_string())));
  }

  #[test]
  fn lax_resolution_vivifies_and_continues() {
    let mut task = Task::new("");
    task.rule("cc", |_| "cl {cfg.cc.flags} /c $in".to_string()).unwrap();

    let mut config = Config::new();
    let options = GenerateOptions { resolve: ResolveMode::Lax, ..GenerateOptions::default() };
    let manifest = task.generate_with(&mut config, options).unwrap();
    assert!(manifest.contains("  command = cl  /c $in\n"));
    assert!(matches!(config.get("cc.flags"), Some(Node::Table(_))));
  }

  #[test]
  fn command_with_raw_newline_fails() {
    let mut task = Task::new("");
    task.rule("cc", |_| "cc $in\necho done".to_string()).unwrap();

    let mut config = Config::new();
    let err = task.generate(&mut config).unwrap_err();
    assert!(matches!(err, GenerateError::Syntax(SyntaxError::EmbeddedNewline { .. })));
  }

  #[test]
  fn long_command_wraps_with_continuation_indent() {
    let mut task = Task::new("");
    task
      .rule("cc", |_| {
        "cl /nologo /W3 /O2 /DNDEBUG /DLUAJIT_ENABLE_LUA52COMPAT /Ihost /Isrc /c /Fo$out $in".to_string()
      })
      .unwrap();
    task.build(|_| vec![("a.obj", "cc", "a.c")]);

    let mut config = Config::new();
    let manifest = task.generate(&mut config).unwrap();
    // The command line exceeds 78 columns and continues at six spaces (two
    // levels past the variable's own indent).
    assert!(manifest.contains(" $\n      "));
    for line in manifest.lines() {
      assert!(line.len() <= 78, "line too long: {line:?}");
    }
  }

  #[test]
  fn pools_includes_subninjas_and_defaults_render_in_order() {
    let mut task = Task::new("");
    task.include("rules.ninja");
    task.pool("link_pool", 2);
    task.rule_with("link", RuleOptions::new().with_pool("link_pool"), |_| {
      "link /out:$out $in".to_string()
    })
    .unwrap();
    task.build(|_| vec![("a.exe", "link", "a.obj")]);
    task.subninja("third_party/build.ninja");
    task.defaults("a.exe");

    let mut config = Config::new();
    let manifest = task.generate(&mut config).unwrap();
    assert_eq!(
      manifest,
      concat!(
        "include rules.ninja\n",
        "\n",
        "pool link_pool\n",
        "  depth = 2\n",
        "\n",
        "rule link\n",
        "  command = link /out:$out $in\n",
        "  pool = link_pool\n",
        "\n",
        "build a.exe: link a.obj\n",
        "\n",
        "subninja third_party/build.ninja\n",
        "\n",
        "default a.exe\n",
      )
    );
  }

  #[test]
  fn generate_replays_deterministically() {
    let mut task = Task::new("");
    task.rule("cc", |_| "cc $in".to_string()).unwrap();
    task.build(|_| vec![("a.o", "cc", "a.c")]);

    let mut config_a = Config::new();
    let mut config_b = Config::new();
    assert_eq!(task.generate(&mut config_a).unwrap(), task.generate(&mut config_b).unwrap());
  }

  #[test]
  fn default_task_is_the_unnamed_one() {
    assert!(Task::new("").is_default());
    assert!(!Task::new("host").is_default());
  }
}
