//! Minimal reader for compiled OSL (`.oso`) artifacts.
//!
//! Only the shader declaration and its `param` / `oparam` lines are read;
//! that is all the registry needs to describe a compiled shader.

use anyhow::{Result, bail};

const SHADER_KEYWORDS: &[&str] = &["shader", "surface", "displacement", "volume", "light"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsoParam {
    pub name: String,
    pub ty: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsoShader {
    pub name: String,
    pub inputs: Vec<OsoParam>,
    pub outputs: Vec<OsoParam>,
}

pub fn parse_oso(text: &str) -> Result<OsoShader> {
    let mut shader: Option<OsoShader> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let Some(head) = tokens.next() else {
            continue;
        };

        if SHADER_KEYWORDS.contains(&head) {
            let Some(name) = tokens.next() else {
                bail!("oso shader declaration without a name: {line}");
            };
            shader = Some(OsoShader {
                name: name.to_string(),
                ..Default::default()
            });
            continue;
        }

        let is_output = match head {
            "param" => false,
            "oparam" => true,
            // Symbols after the parameter block and the code section.
            "code" => break,
            _ => continue,
        };

        let Some(current) = shader.as_mut() else {
            bail!("oso parameter before shader declaration: {line}");
        };

        let Some(mut ty) = tokens.next().map(str::to_string) else {
            bail!("oso parameter without a type: {line}");
        };
        if ty == "closure" {
            let Some(inner) = tokens.next() else {
                bail!("oso closure parameter without a type: {line}");
            };
            ty = format!("closure {inner}");
        }
        let Some(name) = tokens.next() else {
            bail!("oso parameter without a name: {line}");
        };

        let param = OsoParam {
            name: name.to_string(),
            ty,
        };
        if is_output {
            current.outputs.push(param);
        } else {
            current.inputs.push(param);
        }
    }

    match shader {
        Some(s) => Ok(s),
        None => bail!("no shader declaration found in oso"),
    }
}
