//! OSL source emission for a document node and its upstream nodes.

use std::collections::HashSet;

use anyhow::{Result, anyhow, bail};

use super::GenContext;
use crate::document::{DocInput, DocNode, DocPort, InputValue, NodeGraph};

/// Name of the single output every generated shader exposes.
pub const SHADER_OUTPUT: &str = "out";

/// MaterialX value type → OSL type.
pub fn osl_type(mtlx_type: &str) -> Option<&'static str> {
    Some(match mtlx_type {
        "float" => "float",
        "integer" | "boolean" => "int",
        "color3" => "color",
        "color4" => "color4",
        "vector2" | "float2" => "vector2",
        "vector3" => "vector",
        "vector4" => "vector4",
        "matrix33" | "matrix44" => "matrix",
        "string" | "filename" => "string",
        _ => return None,
    })
}

fn osl_default(osl_ty: &str) -> &'static str {
    match osl_ty {
        "float" => "0.0",
        "int" => "0",
        "color" => "color(0.0)",
        "color4" => "color4(color(0.0), 0.0)",
        "vector2" => "vector2(0.0, 0.0)",
        "vector" => "vector(0.0)",
        "vector4" => "vector4(0.0, 0.0, 0.0, 0.0)",
        "matrix" => "matrix(1.0)",
        _ => "\"\"",
    }
}

fn fmt_float(f: f32) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn osl_literal(value: &InputValue, osl_ty: &str) -> Result<String> {
    let joined = |v: &[f32]| v.iter().map(|f| fmt_float(*f)).collect::<Vec<_>>().join(", ");
    Ok(match (osl_ty, value) {
        ("string", InputValue::String(s)) => quote(s),
        ("float", InputValue::Float(f)) => fmt_float(*f),
        ("float", InputValue::Integer(i)) => fmt_float(*i as f32),
        ("int", InputValue::Integer(i)) => i.to_string(),
        ("int", InputValue::Boolean(b)) => i32::from(*b).to_string(),
        ("color" | "vector", InputValue::Vector(v)) if v.len() == 3 => {
            format!("{osl_ty}({})", joined(v))
        }
        ("color" | "vector", InputValue::Float(f)) => format!("{osl_ty}({})", fmt_float(*f)),
        ("vector2", InputValue::Vector(v)) if v.len() == 2 => format!("vector2({})", joined(v)),
        ("vector4", InputValue::Vector(v)) if v.len() == 4 => format!("vector4({})", joined(v)),
        ("color4", InputValue::Vector(v)) if v.len() == 4 => format!(
            "color4(color({}, {}, {}), {})",
            fmt_float(v[0]),
            fmt_float(v[1]),
            fmt_float(v[2]),
            fmt_float(v[3])
        ),
        (ty, v) => bail!("cannot express {v:?} as OSL {ty}"),
    })
}

fn var_name(node_name: &str) -> String {
    let mut s: String = node_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if s.starts_with(|c: char| c.is_ascii_digit()) {
        s.insert(0, '_');
    }
    s
}

/// Nodes feeding `root` inside `graph`, upstream first, `root` last.
fn upstream_order<'a>(graph: &'a NodeGraph, root: &'a DocNode) -> Result<Vec<&'a DocNode>> {
    enum Visit {
        Enter,
        Exit,
    }

    let mut order: Vec<&DocNode> = Vec::new();
    let mut done: HashSet<&str> = HashSet::new();
    let mut on_path: HashSet<&str> = HashSet::new();
    let mut stack: Vec<(&DocNode, Visit)> = vec![(root, Visit::Enter)];

    while let Some((node, visit)) = stack.pop() {
        match visit {
            Visit::Exit => {
                on_path.remove(node.name.as_str());
                if done.insert(node.name.as_str()) {
                    order.push(node);
                }
            }
            Visit::Enter => {
                if done.contains(node.name.as_str()) {
                    continue;
                }
                if !on_path.insert(node.name.as_str()) {
                    bail!("cycle detected at node '{}'", node.name);
                }
                stack.push((node, Visit::Exit));
                for input in node.inputs.iter().rev() {
                    let Some(up_name) = input.connected_node.as_deref() else {
                        continue;
                    };
                    let up = graph.node(up_name).ok_or_else(|| {
                        anyhow!(
                            "node '{}' input '{}' references '{}' outside graph '{}'",
                            node.name,
                            input.name,
                            up_name,
                            graph.name
                        )
                    })?;
                    stack.push((up, Visit::Enter));
                }
            }
        }
    }
    Ok(order)
}

fn value_type(value: &InputValue) -> &'static str {
    match value {
        InputValue::String(_) => "string",
        InputValue::Float(_) => "float",
        InputValue::Integer(_) => "integer",
        InputValue::Boolean(_) => "boolean",
        InputValue::Vector(v) => match v.len() {
            2 => "vector2",
            4 => "vector4",
            _ => "vector3",
        },
    }
}

fn is_image_category(category: &str) -> bool {
    matches!(category, "image" | "tiledimage")
}

/// Output ports of `node`, in declaration order. Nodes without a known
/// definition have a single `out` of the node's type.
fn output_ports(node: &DocNode) -> Vec<DocPort> {
    match &node.signature {
        Some(sig) if !sig.outputs.is_empty() => sig.outputs.clone(),
        _ => vec![DocPort::new(SHADER_OUTPUT, &node.ty)],
    }
}

/// Output read when a connection names none: `out` when declared, otherwise
/// the first output.
fn default_output(node: &DocNode) -> DocPort {
    let mut ports = output_ports(node);
    match ports.iter().position(|p| p.name == SHADER_OUTPUT) {
        Some(i) => ports.swap_remove(i),
        None => ports.swap_remove(0),
    }
}

fn output_var(node_name: &str, output: &str) -> String {
    format!("{}_{}", var_name(node_name), var_name(output))
}

fn connection_arg(graph: &NodeGraph, node: &DocNode, input: &DocInput, up_name: &str) -> Result<String> {
    let up = graph
        .node(up_name)
        .ok_or_else(|| anyhow!("node '{}' references unknown node '{}'", node.name, up_name))?;
    let output = match input.output.as_deref() {
        Some(output) => {
            if !output_ports(up).iter().any(|p| p.name == output) {
                bail!(
                    "node '{}' input '{}' reads undeclared output '{}' of '{}'",
                    node.name,
                    input.name,
                    output,
                    up.name
                );
            }
            output.to_string()
        }
        None => default_output(up).name,
    };
    Ok(output_var(&up.name, &output))
}

/// Argument passed for input `name` of `node`: the upstream output variable,
/// the authored literal, or the declared default when nothing is authored.
fn input_arg(
    ctx: &GenContext,
    graph: &NodeGraph,
    node: &DocNode,
    name: &str,
    declared_ty: &str,
    declared_default: Option<&InputValue>,
) -> Result<String> {
    let input = node.input(name);
    let ty = match input {
        Some(i) if !i.ty.is_empty() => i.ty.as_str(),
        _ => declared_ty,
    };

    let connected = input.and_then(|i| i.connected_node.as_deref().map(|up| (i, up)));
    let arg = if let Some((input, up_name)) = connected {
        connection_arg(graph, node, input, up_name)?
    } else if let Some(value) = input.and_then(|i| i.value.as_ref()).or(declared_default) {
        let ty = if ty.is_empty() { value_type(value) } else { ty };
        let osl_ty = osl_type(ty).ok_or_else(|| {
            anyhow!("input '{}.{}' has unsupported type '{}'", node.name, name, ty)
        })?;
        osl_literal(value, osl_ty)?
    } else if name == "texcoord" && is_image_category(&node.category) {
        "vector2(u, v)".to_string()
    } else {
        let osl_ty = osl_type(ty).ok_or_else(|| {
            anyhow!("input '{}.{}' has unsupported type '{}'", node.name, name, ty)
        })?;
        osl_default(osl_ty).to_string()
    };

    if name == "texcoord"
        && is_image_category(&node.category)
        && ctx.options.file_texture_vertical_flip
    {
        return Ok(format!("vector2(({arg}).x, 1.0 - ({arg}).y)"));
    }
    Ok(arg)
}

/// Call arguments for `node`, inputs first.
///
/// Nodes with a known definition pass every declared input in declaration
/// order, so every call to one function has the same arity. Other nodes
/// pass their inputs as authored.
fn call_args(ctx: &GenContext, graph: &NodeGraph, node: &DocNode) -> Result<Vec<String>> {
    let mut args = Vec::new();
    match &node.signature {
        Some(sig) => {
            for port in &sig.inputs {
                args.push(input_arg(
                    ctx,
                    graph,
                    node,
                    &port.name,
                    &port.ty,
                    port.default.as_ref(),
                )?);
            }
            for input in &node.inputs {
                if !sig.inputs.iter().any(|p| p.name == input.name) {
                    log::debug!("ignoring undeclared input '{}.{}'", node.name, input.name);
                }
            }
        }
        None => {
            for input in &node.inputs {
                args.push(input_arg(ctx, graph, node, &input.name, &input.ty, None)?);
            }
            if is_image_category(&node.category) && node.input("texcoord").is_none() {
                args.push(input_arg(ctx, graph, node, "texcoord", "vector2", None)?);
            }
        }
    }
    Ok(args)
}

/// `ND_image_color3` → `image_color3`; nodes without a definition use
/// `<category>_<type>`.
fn function_name(node: &DocNode) -> String {
    match node.node_def.as_deref().and_then(|d| d.strip_prefix("ND_")) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("{}_{}", node.category, node.ty),
    }
}

/// Emit a complete OSL shader named `shader_name` computing `root`.
pub fn emit_shader(
    ctx: &GenContext,
    shader_name: &str,
    graph: &NodeGraph,
    root: &DocNode,
) -> Result<String> {
    let order = upstream_order(graph, root)?;

    let root_output = default_output(root);
    let out_ty = osl_type(&root_output.ty).ok_or_else(|| {
        anyhow!(
            "node '{}' has unsupported output type '{}'",
            root.name,
            root_output.ty
        )
    })?;

    let mut body = String::new();
    for node in &order {
        if node.category.is_empty() {
            bail!("node '{}' has no MaterialX definition", node.name);
        }

        let mut args = call_args(ctx, graph, node)?;
        for port in output_ports(node) {
            let port_ty = osl_type(&port.ty).ok_or_else(|| {
                anyhow!(
                    "node '{}' output '{}' has unsupported type '{}'",
                    node.name,
                    port.name,
                    port.ty
                )
            })?;
            let var = output_var(&node.name, &port.name);
            body.push_str(&format!("    {port_ty} {var} = {};\n", osl_default(port_ty)));
            args.push(var);
        }

        body.push_str(&format!("    mx_{}({});\n", function_name(node), args.join(", ")));
    }
    body.push_str(&format!(
        "    {SHADER_OUTPUT} = {};\n",
        output_var(&root.name, &root_output.name)
    ));

    let mut src = String::new();
    src.push_str(&format!(
        "// MaterialX node '{}' from graph '{}'\n",
        root.name, graph.name
    ));
    for path in ctx.search_paths() {
        src.push_str(&format!("// search path: {}\n", path.display()));
    }
    src.push_str("#include \"mx_funcs.h\"\n\n");
    src.push_str(&format!("shader {shader_name}\n"));
    src.push_str(&format!(
        "[[ string mtlx_category = {}, string mtlx_name = {} ]]\n",
        quote(&root.category),
        quote(&root.name)
    ));
    src.push_str(&format!(
        "(\n    output {out_ty} {SHADER_OUTPUT} = {}\n)\n",
        osl_default(out_ty)
    ));
    src.push_str("{\n");
    src.push_str(&body);
    src.push_str("}\n");
    Ok(src)
}
