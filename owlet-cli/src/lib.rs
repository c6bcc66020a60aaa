use anyhow::{Context, Result, anyhow, bail};
use owlet_dom::{HostAdapter, MemoryHost, Patcher};
use owlet_template::{QWeb, RenderContext, Value, resolve_pending};
use std::fs;
use std::path::Path;
use std::sync::Once;
use tracing::{debug, info};

static TRACING_INIT: Once = Once::new();

/// Installs a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Does nothing when `RUST_LOG` is unset. Safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}

/// Loads a template file.
///
/// A file whose root is `<templates>` registers every `t-name`d child;
/// anything else registers as one template named after the file stem.
pub fn load(input: &Path) -> Result<QWeb> {
    let src = fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?;
    let mut qweb = QWeb::new();
    if src.trim_start().starts_with("<templates") {
        let count = qweb
            .load_templates(&src)
            .with_context(|| format!("failed to load {}", input.display()))?;
        debug!(count, file = %input.display(), "loaded template set");
    } else {
        let name = input.file_stem().and_then(|s| s.to_str()).unwrap_or("template");
        qweb.add_template(name, &src, false)
            .with_context(|| format!("failed to load {}", input.display()))?;
    }
    Ok(qweb)
}

fn sorted_names(qweb: &QWeb) -> Vec<String> {
    let mut names: Vec<String> = qweb.template_names().map(str::to_string).collect();
    names.sort();
    names
}

/// Compiles every template of `input`. Returns the template names.
pub fn check_cmd(input: &Path) -> Result<Vec<String>> {
    let qweb = load(input)?;
    let names = sorted_names(&qweb);
    for name in &names {
        let compiled = qweb
            .compiled(name)
            .with_context(|| format!("template '{name}' in {}", input.display()))?;
        debug!(template = %name, statements = compiled.statement_count(), "compiled");
    }
    info!(templates = names.len(), file = %input.display(), "check passed");
    Ok(names)
}

/// Reads the JSON render context, `undefined` when absent.
pub fn read_context(path: Option<&Path>) -> Result<Value> {
    let Some(path) = path else {
        return Ok(Value::Undefined);
    };
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let json: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))?;
    Ok(Value::from(json))
}

/// Renders one template (or, with `all`, every template) of `input` to markup.
///
/// Without `name` the file must hold exactly one template. With `all`, each
/// template's markup is prefixed by a `<!-- name -->` line.
pub fn render_cmd(input: &Path, name: Option<&str>, context: Option<&Path>, all: bool) -> Result<String> {
    let qweb = load(input)?;
    let data = read_context(context)?;

    if all {
        let mut out = String::new();
        for name in sorted_names(&qweb) {
            out.push_str(&format!("<!-- {name} -->\n"));
            out.push_str(&render_markup(&qweb, &name, &data)?);
            out.push('\n');
        }
        return Ok(out);
    }

    let name = match name {
        Some(name) => name.to_string(),
        None => {
            let names = sorted_names(&qweb);
            match names.as_slice() {
                [only] => only.clone(),
                _ => bail!("{} holds {} templates; pick one with --name", input.display(), names.len()),
            }
        }
    };
    render_markup(&qweb, &name, &data)
}

/// Renders every root of `name` into a scratch host and serializes them.
pub fn render_markup(qweb: &QWeb, name: &str, data: &Value) -> Result<String> {
    if !qweb.has_template(name) {
        return Err(anyhow!("no template named '{name}'"));
    }
    let rctx = RenderContext::new();
    let mut roots = qweb
        .render_fragment(name, data, &rctx)
        .with_context(|| format!("failed to render '{name}'"))?;
    pollster::block_on(resolve_pending(&rctx, &mut roots)).with_context(|| format!("failed to render '{name}'"))?;

    let mut host = MemoryHost::new();
    let mut patcher = Patcher::new();
    let container = host.create_element("div");
    let mut markup = String::new();
    for root in roots {
        let placeholder = host.create_comment("");
        host.append_child(container, placeholder);
        let patched = patcher.patch(&mut host, placeholder, root);
        if let Some(node) = patched.host {
            markup.push_str(&host.to_markup(node));
        }
    }
    Ok(markup)
}
