//! The bundled sample project.
//!
//! A small MSVC-toolchain build of a Lua interpreter, exercising the full
//! declaration surface: configuration hooks, plain and option-bearing
//! rules, response files, positional and keyed edge shapes, and a lazy
//! edge generator.

use genja_lib::config::ConfigRegistry;
use genja_lib::syntax::RuleOptions;
use genja_lib::task::{DeclareError, EdgeSpec, Task};

/// Configuration hooks for the sample project, in declaration order.
pub fn registry() -> ConfigRegistry {
  let mut registry = ConfigRegistry::new();
  registry.register(|config| {
    config.set("cc.exe", "cl");
    config.set("cc.flags", "/nologo");
  });
  registry.register(|config| {
    config.set("link.exe", "link");
    config.set("link.flags", "/nologo");
  });
  registry
}

/// The sample task: rules and edges for building `minilua.exe`.
pub fn task() -> Result<Task, DeclareError> {
  let mut task = Task::new("");

  task.rule("cc", |_| "{cfg.cc.exe} {cfg.cc.flags} /c /Fo$out $in".to_string())?;
  task.rule_with(
    "link",
    RuleOptions::new().with_rspfile("$out.rsp", "$in"),
    |_| "{cfg.link.exe} {cfg.link.flags} /out:$out @$out.rsp".to_string(),
  )?;
  task.rule("mt", |_| {
    "cmd /c if exist $in (mt /nologo -manifest $in -outputresource:$out)".to_string()
  })?;
  task.rule_with(
    "lib",
    RuleOptions::new().with_rspfile("$out.rsp", "$in"),
    |_| "lib /nologo /out:$out @$out.rsp".to_string(),
  )?;

  task.build(|_| {
    vec![
      EdgeSpec::from(("minilua.obj", "cc", "host/minilua.c")),
      EdgeSpec::new("minilua.exe", "link").inputs("minilua.obj"),
    ]
  });

  task.build(|_| {
    ["lib_aux", "lib_base", "lib_init"]
      .into_iter()
      .map(|name| (format!("{name}.obj"), "cc", format!("src/{name}.c")))
  });

  task.defaults("minilua.exe");

  Ok(task)
}
