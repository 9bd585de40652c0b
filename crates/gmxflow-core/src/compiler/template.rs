use super::{CompileError, CompiledCommand};
use crate::core::models::node::NodeInstance;
use crate::core::models::property::MENU_SELECTOR_KEY;
use crate::core::registry::{CommandTemplate, NodeType, PortTypeRegistry};
use std::collections::HashSet;
use tracing::trace;

/// A piece of a template line.
#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

/// Splits a template line into literal runs and `{flag}` placeholders.
///
/// A brace pair only counts as a placeholder when the name between the braces
/// is non-empty and contains no whitespace or further braces; anything else is
/// kept verbatim.
fn tokenize(line: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut literal_start = 0;
    let mut cursor = 0;

    while let Some(open) = line[cursor..].find('{').map(|i| cursor + i) {
        let Some(close) = line[open + 1..].find('}').map(|i| open + 1 + i) else {
            break;
        };
        let name = &line[open + 1..close];
        let valid = !name.is_empty() && !name.chars().any(|c| c.is_whitespace() || c == '{');
        if !valid {
            cursor = open + 1;
            continue;
        }
        if open > literal_start {
            tokens.push(Token::Literal(&line[literal_start..open]));
        }
        tokens.push(Token::Placeholder(name));
        literal_start = close + 1;
        cursor = close + 1;
    }

    if literal_start < line.len() {
        tokens.push(Token::Literal(&line[literal_start..]));
    }
    tokens
}

fn placeholders(line: &str) -> impl Iterator<Item = &str> {
    tokenize(line).into_iter().filter_map(|t| match t {
        Token::Placeholder(name) => Some(name),
        Token::Literal(_) => None,
    })
}

/// Value a placeholder resolves to: the node's live value, otherwise the
/// declared default of the flag.
fn resolve<'a>(
    node: &'a NodeInstance,
    node_type: &'a NodeType,
    flag: &str,
) -> Result<&'a str, CompileError> {
    node.value(flag)
        .or_else(|| node_type.property_spec(flag).map(|s| s.default.as_str()))
        .ok_or_else(|| CompileError::MissingProperty {
            node: node.name().to_string(),
            type_id: node.type_id().to_string(),
            flag: flag.to_string(),
        })
}

fn render_line(
    line: &str,
    node: &NodeInstance,
    node_type: &NodeType,
) -> Result<String, CompileError> {
    let mut rendered = String::with_capacity(line.len());
    for token in tokenize(line) {
        match token {
            Token::Literal(text) => rendered.push_str(text),
            Token::Placeholder(flag) => rendered.push_str(resolve(node, node_type, flag)?),
        }
    }
    Ok(rendered)
}

fn push_pair(line: &mut String, flag: &str, value: &str) {
    if !line.is_empty() {
        line.push(' ');
    }
    line.push_str(flag);
    if !value.is_empty() {
        line.push(' ');
        line.push_str(value);
    }
}

/// Renders the executable command(s) of one node from its type's template.
///
/// Placeholders are replaced by literal substitution; no quoting is applied.
/// Activated optional properties that the template does not mention are
/// appended to their declared template line as `flag value`.
pub(super) fn compile_node(
    registry: &PortTypeRegistry,
    node: &NodeInstance,
) -> Result<CompiledCommand, CompileError> {
    let node_type = registry.spec_for(node.type_id())?;
    let template = node_type.command.lines();

    let referenced: HashSet<&str> = template.iter().flat_map(|l| placeholders(l)).collect();

    let mut lines = template
        .iter()
        .map(|line| render_line(line, node, node_type))
        .collect::<Result<Vec<_>, _>>()?;

    for flag in node.activated_optional() {
        if referenced.contains(flag) {
            continue;
        }
        let (Some(spec), Some(value)) = (node_type.optional_properties.get(flag), node.value(flag))
        else {
            continue;
        };
        if let Some(line) = lines.get_mut(spec.line) {
            push_pair(line, flag, value);
        }
    }

    trace!("Compiled '{}' into {} line(s)", node.name(), lines.len());
    Ok(match node_type.command {
        CommandTemplate::Single(_) => {
            CompiledCommand::Single(lines.into_iter().next().unwrap_or_default())
        }
        CommandTemplate::Sequence(_) => CompiledCommand::Sequence(lines),
    })
}

/// Renders the flag-pair form of one node: the tool prefix followed by every
/// materialized property as `flag value`, in insertion order.
pub(super) fn render_preview(
    registry: &PortTypeRegistry,
    node: &NodeInstance,
) -> Result<String, CompileError> {
    let node_type = registry.spec_for(node.type_id())?;
    let mut line = node_type.tool.clone();
    for (flag, value) in node.flag_values() {
        if flag == MENU_SELECTOR_KEY {
            continue;
        }
        push_pair(&mut line, flag, value);
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_placeholders_and_literals() {
        assert_eq!(
            tokenize("gmx editconf -f {-f} -o {-o}"),
            vec![
                Token::Literal("gmx editconf -f "),
                Token::Placeholder("-f"),
                Token::Literal(" -o "),
                Token::Placeholder("-o"),
            ]
        );
    }

    #[test]
    fn tokenize_keeps_malformed_braces_verbatim() {
        assert_eq!(tokenize("echo {} {a b} {"), vec![Token::Literal("echo {} {a b} {")]);
        assert_eq!(
            tokenize("x{{-f}"),
            vec![Token::Literal("x{"), Token::Placeholder("-f")]
        );
    }

    #[test]
    fn push_pair_renders_empty_value_as_bare_flag() {
        let mut line = "gmx genion".to_string();
        push_pair(&mut line, "-neutral", "");
        push_pair(&mut line, "-conc", "0.15");
        assert_eq!(line, "gmx genion -neutral -conc 0.15");
    }
}
