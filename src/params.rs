use regex::Regex;
use std::f64::consts::PI;
use std::sync::OnceLock;

static PI_EXPR_REGEX: OnceLock<Regex> = OnceLock::new();

/// Angles printed as a pi fraction. Each value is computed with the same
/// operations [`parse_param_expr`] applies to its display form, so printing
/// then parsing gives back the identical `f64`.
const PI_FORMS: [(&str, f64, f64); 10] = [
    ("2*pi", 2.0, 1.0),
    ("pi", 1.0, 1.0),
    ("pi/2", 1.0, 2.0),
    ("pi/3", 1.0, 3.0),
    ("pi/4", 1.0, 4.0),
    ("pi/6", 1.0, 6.0),
    ("pi/8", 1.0, 8.0),
    ("3*pi/4", 3.0, 4.0),
    ("3*pi/2", 3.0, 2.0),
    ("2*pi/3", 2.0, 3.0),
];

/// Parses a plain float literal or a pi expression such as `pi/2`,
/// `-3*pi/4` or `0.5pi`.
pub fn parse_param_expr(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(val) = s.parse::<f64>() {
        return Some(val);
    }

    let s = s.to_lowercase();
    let re = PI_EXPR_REGEX.get_or_init(|| {
        Regex::new(r"^(-?)(\d*\.?\d*)\s*\*?\s*pi(?:\s*/\s*(\d+\.?\d*))?$")
            .expect("pi expression pattern is valid")
    });

    let caps = re.captures(&s)?;
    let negative = &caps[1] == "-";
    let coeff_str = &caps[2];
    let denom_str = caps.get(3).map_or("", |m| m.as_str());

    let mut coeff = 1.0;
    if !coeff_str.is_empty() {
        coeff = coeff_str.parse::<f64>().ok()?;
    }

    let mut result = coeff * PI;

    if !denom_str.is_empty() {
        let denom = denom_str.parse::<f64>().ok()?;
        if denom == 0.0 {
            return None;
        }
        result /= denom;
    }

    if negative {
        result = -result;
    }
    Some(result)
}

pub fn format_param(val: f64) -> String {
    for (display, coeff, denom) in PI_FORMS {
        let value = coeff * PI / denom;
        if val == value {
            return display.to_string();
        }
        if val == -value {
            return format!("-{display}");
        }
    }

    val.to_string()
}
