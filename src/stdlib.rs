//! MaterialX standard library loader.
//!
//! Scans `*.mtlx` files below the search paths and records the `<nodedef>`
//! declarations they contain. The document builder falls back to these when
//! a node type has no registry entry.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDefInfo {
    pub name: String,
    /// Node category (`image`, `multiply`, ...).
    pub node: String,
    pub ty: String,
    pub inputs: Vec<(String, String)>,
    pub outputs: Vec<(String, String)>,
    /// Declared `value` of each input that has one, as written.
    pub input_values: BTreeMap<String, String>,
}

impl NodeDefInfo {
    pub fn input_type(&self, input: &str) -> Option<&str> {
        self.inputs
            .iter()
            .find(|(name, _)| name == input)
            .map(|(_, ty)| ty.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StdLibrary {
    search_paths: Vec<PathBuf>,
    node_defs: BTreeMap<String, NodeDefInfo>,
    files: Vec<PathBuf>,
}

impl StdLibrary {
    pub fn load(search_paths: &[PathBuf]) -> Self {
        let mut lib = StdLibrary {
            search_paths: search_paths.to_vec(),
            ..Default::default()
        };

        for root in search_paths {
            for file in collect_mtlx_files(root) {
                match std::fs::read_to_string(&file) {
                    Ok(text) => {
                        for def in parse_node_defs(&text) {
                            lib.node_defs.entry(def.name.clone()).or_insert(def);
                        }
                        lib.files.push(file);
                    }
                    Err(e) => {
                        log::warn!("Unable to read MaterialX library '{}': {e}", file.display());
                    }
                }
            }
        }

        log::debug!(
            "loaded {} MaterialX nodedefs from {} files",
            lib.node_defs.len(),
            lib.files.len()
        );
        lib
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn node_def(&self, name: &str) -> Option<&NodeDefInfo> {
        self.node_defs.get(name)
    }

    pub fn len(&self) -> usize {
        self.node_defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_defs.is_empty()
    }
}

fn collect_mtlx_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(rd) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in rd.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("mtlx"))
            {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}

/// Offset of the `>` closing a tag, skipping quoted attribute values.
fn tag_end(body: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in body.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(i),
            _ => {}
        }
    }
    None
}

fn unescape(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Extract `name="value"` (or single-quoted) attributes from the body of a tag.
fn parse_attributes(tag: &str) -> BTreeMap<String, String> {
    let mut attrs = BTreeMap::new();
    let mut rest = tag;
    while let Some(eq) = rest.find('=') {
        let key = rest[..eq].trim_end();
        let key = key
            .rsplit(|c: char| c.is_whitespace())
            .next()
            .unwrap_or("")
            .to_string();
        let after = rest[eq + 1..].trim_start();
        let Some(q) = after.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            rest = &rest[eq + 1..];
            continue;
        };
        let value = &after[1..];
        let Some(end) = value.find(q) else {
            break;
        };
        if !key.is_empty() {
            attrs.insert(key, unescape(&value[..end]));
        }
        rest = &value[end + 1..];
    }
    attrs
}

/// Attributes of every `<element ...>` tag found in `text`.
fn child_tags(text: &str, element: &str) -> Vec<BTreeMap<String, String>> {
    let open = format!("<{element}");
    let mut tags = Vec::new();
    let mut rest = text;
    while let Some(i) = rest.find(&open) {
        let body = &rest[i + open.len()..];
        // `<inputs>` is not `<input`.
        if !body.starts_with(|c: char| c.is_whitespace() || c == '/' || c == '>') {
            rest = body;
            continue;
        }
        let end = tag_end(body).unwrap_or(body.len());
        tags.push(parse_attributes(&body[..end]));
        rest = &body[end..];
    }
    tags
}

fn name_and_type(attrs: &BTreeMap<String, String>) -> Option<(String, String)> {
    Some((attrs.get("name")?.clone(), attrs.get("type")?.clone()))
}

fn parse_node_defs(text: &str) -> Vec<NodeDefInfo> {
    let mut defs = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("<nodedef") {
        let body = &rest[start + "<nodedef".len()..];
        let Some(end) = tag_end(body) else {
            break;
        };
        let tag = &body[..end];
        let attrs = parse_attributes(tag);
        let self_closing = tag.trim_end().ends_with('/');

        // Children run until the closing tag, unless the tag closed itself.
        let children = if self_closing {
            ""
        } else {
            let after = &body[end + 1..];
            let close = after.find("</nodedef>").unwrap_or(after.len());
            &after[..close]
        };

        let input_tags = child_tags(children, "input");
        let inputs: Vec<(String, String)> = input_tags.iter().filter_map(name_and_type).collect();
        let input_values: BTreeMap<String, String> = input_tags
            .iter()
            .filter_map(|tag| Some((tag.get("name")?.clone(), tag.get("value")?.clone())))
            .collect();
        let outputs: Vec<(String, String)> = child_tags(children, "output")
            .iter()
            .filter_map(name_and_type)
            .collect();

        // 1.38 declares the value type on the first <output> child.
        let ty = attrs
            .get("type")
            .cloned()
            .or_else(|| outputs.first().map(|(_, ty)| ty.clone()))
            .unwrap_or_default();
        let outputs = if outputs.is_empty() && !ty.is_empty() {
            vec![("out".to_string(), ty.clone())]
        } else {
            outputs
        };

        if let (Some(name), Some(node)) = (attrs.get("name"), attrs.get("node")) {
            defs.push(NodeDefInfo {
                name: name.clone(),
                node: node.clone(),
                ty,
                inputs,
                outputs,
                input_values,
            });
        }

        rest = &body[end..];
    }

    defs
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFS: &str = r#"<?xml version="1.0"?>
<materialx version="1.38">
  <nodedef name="ND_image_color3" node="image" nodegroup="texture2d">
    <input name="file" type="filename" value="" uniform="true" />
    <input name="texcoord" type="vector2" defaultgeomprop="UV0" />
    <output name="out" type="color3" />
  </nodedef>
  <nodedef name="ND_add_float" node="add" type="float" />
</materialx>
"#;

    #[test]
    fn parses_nodedefs_and_inputs() {
        let defs = parse_node_defs(DEFS);
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "ND_image_color3");
        assert_eq!(defs[0].node, "image");
        assert_eq!(defs[0].input_type("texcoord"), Some("vector2"));
        assert_eq!(defs[0].ty, "color3");
        assert_eq!(defs[1].node, "add");
        assert_eq!(defs[1].ty, "float");
        assert!(defs[1].inputs.is_empty());
        assert_eq!(defs[1].outputs, [("out".to_string(), "float".to_string())]);
    }

    #[test]
    fn quoted_angle_brackets_do_not_end_tags() {
        let text = r#"<nodedef name="ND_separate3_color3" node="separate3" doc="a > b, &quot;c&quot;">
    <input name="in" type="color3" doc="x -> y" value="0, 0, 0" />
    <output name="outr" type="float" />
    <output name="outg" type="float" />
    <output name="outb" type="float" />
  </nodedef>"#;
        let defs = parse_node_defs(text);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].node, "separate3");
        assert_eq!(defs[0].ty, "float");
        assert_eq!(defs[0].input_type("in"), Some("color3"));
        assert_eq!(defs[0].input_values.get("in").map(String::as_str), Some("0, 0, 0"));
        let outputs: Vec<&str> = defs[0].outputs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(outputs, ["outr", "outg", "outb"]);
        assert_eq!(
            parse_attributes(r#" doc="a &gt; b &quot;c&quot;" name='x'"#).get("doc").map(String::as_str),
            Some("a > b \"c\"")
        );
    }

    #[test]
    fn loads_from_search_paths() {
        let root = std::env::temp_dir().join(format!("mtlx-matfilt-stdlib-{}", uuid::Uuid::new_v4()));
        let nested = root.join("stdlib");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("stdlib_defs.mtlx"), DEFS).unwrap();
        std::fs::write(nested.join("README.txt"), "not a library").unwrap();

        let lib = StdLibrary::load(&[root.clone(), root.join("missing")]);
        assert_eq!(lib.len(), 2);
        assert!(lib.node_def("ND_add_float").is_some());
        assert_eq!(lib.search_paths().len(), 2);

        std::fs::remove_dir_all(&root).ok();
    }
}
