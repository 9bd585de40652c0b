use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid --set format: '{0}'. Expected KEY=VALUE.")]
    InvalidSetFormat(String),

    #[error("Invalid node specification '{0}'. Expected 'type' or 'type@x,y' (e.g., 'editconf@200,0').")]
    InvalidNodeSpec(String),

    #[error("Invalid coordinate '{value}' in node specification '{spec}'.")]
    InvalidCoordinate { spec: String, value: String },
}

/// A `--type` argument of `gmxflow new`.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub type_id: String,
    pub position: Option<(f64, f64)>,
}

/// Splits `KEY=VALUE` at the first `=`. The value may be empty.
pub fn parse_set_value(pair: &str) -> Result<(&str, &str), ParseError> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value)),
        _ => Err(ParseError::InvalidSetFormat(pair.to_string())),
    }
}

pub fn parse_node_spec(spec: &str) -> Result<NodeSpec, ParseError> {
    let (type_id, position) = match spec.split_once('@') {
        Some((type_id, coords)) => (type_id, Some(coords)),
        None => (spec, None),
    };
    if type_id.is_empty() || type_id.contains(char::is_whitespace) {
        return Err(ParseError::InvalidNodeSpec(spec.to_string()));
    }

    let position = match position {
        None => None,
        Some(coords) => {
            let (x, y) = coords
                .split_once(',')
                .ok_or_else(|| ParseError::InvalidNodeSpec(spec.to_string()))?;
            let coordinate = |value: &str| {
                value
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| ParseError::InvalidCoordinate {
                        spec: spec.to_string(),
                        value: value.to_string(),
                    })
            };
            Some((coordinate(x)?, coordinate(y)?))
        }
    };

    Ok(NodeSpec {
        type_id: type_id.to_string(),
        position,
    })
}
