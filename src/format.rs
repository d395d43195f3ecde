//! Field value formatting.
//!
//! Fields carry either a printf-style format string applied to the value
//! here, or the tag of a built-in format that the database runs. Numbers
//! format as numbers, everything else as text.

/// The single value a field format is applied to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormatArg<'a> {
    Number(f64),
    Text(&'a str),
}

impl FormatArg<'_> {
    fn number(&self) -> f64 {
        match self {
            FormatArg::Number(n) => *n,
            FormatArg::Text(s) => s.trim().parse().unwrap_or(0.0),
        }
    }

    fn text(&self) -> String {
        match self {
            FormatArg::Number(n) => number_text(*n),
            FormatArg::Text(s) => s.to_string(),
        }
    }
}

/// Shortest readable form of a number: integral values print without a
/// fraction and accumulated float noise below 1e-10 is rounded away.
pub fn number_text(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let fixed = format!("{value:.10}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Database function behind a built-in format tag.
pub fn builtin_function(tag: &str) -> Option<&'static str> {
    let func = match tag {
        "qty" => "formatQty",
        "qtyper" => "formatQtyPer",
        "uomratio" => "formatUOMRatio",
        "percent" => "formatPrcnt",
        "cost" => "formatCost",
        "price" => "formatPrice",
        "purchprice" => "formatPurchPrice",
        "salesprice" => "formatSalesPrice",
        "extprice" => "formatExtPrice",
        "weight" => "formatWeight",
        "money" => "formatMoney",
        _ => return None,
    };
    Some(func)
}

#[derive(Debug, Default, Clone, Copy)]
struct Spec {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alt: bool,
    width: usize,
    precision: Option<usize>,
}

/// Apply a printf-style `format` to one argument.
///
/// Supports the flags `-+ 0#`, a width, a precision and the conversions
/// `d i u f F e E g G x X o c s %`. Length modifiers are accepted and
/// ignored. Conversions after the first receive an empty argument.
pub fn sprintf(format: &str, arg: FormatArg<'_>) -> String {
    let mut out = String::with_capacity(format.len() + 16);
    let mut chars = format.chars().peekable();
    let mut consumed = false;

    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        let mut spec = Spec::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.left = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                '0' => spec.zero = true,
                '#' => spec.alt = true,
                _ => break,
            }
            chars.next();
        }
        while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
            spec.width = spec.width * 10 + d as usize;
            chars.next();
        }
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut p = 0usize;
            while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
                p = p * 10 + d as usize;
                chars.next();
            }
            spec.precision = Some(p);
        }
        while matches!(chars.peek(), Some('h' | 'l' | 'L' | 'q' | 'j' | 'z' | 't')) {
            chars.next();
        }
        let Some(conv) = chars.next() else {
            out.push('%');
            break;
        };
        if conv == '%' {
            out.push('%');
            continue;
        }
        let current = if consumed { FormatArg::Text("") } else { arg };
        consumed = true;
        match format_one(conv, spec, current) {
            Some(s) => out.push_str(&s),
            None => {
                out.push('%');
                out.push(conv);
            }
        }
    }
    out
}

fn format_one(conv: char, spec: Spec, arg: FormatArg<'_>) -> Option<String> {
    let numeric = |body: String, negative: bool, prefix: &str| {
        let sign = if negative {
            "-"
        } else if spec.plus {
            "+"
        } else if spec.space {
            " "
        } else {
            ""
        };
        pad_numeric(sign, prefix, &body, spec)
    };
    let s = match conv {
        'd' | 'i' | 'u' => {
            let v = arg.number().trunc() as i64;
            let mut digits = v.unsigned_abs().to_string();
            if let Some(p) = spec.precision {
                if digits.len() < p {
                    digits = format!("{}{}", "0".repeat(p - digits.len()), digits);
                }
            }
            numeric(digits, v < 0, "")
        }
        'f' | 'F' => {
            let v = arg.number();
            let body = format!("{:.*}", spec.precision.unwrap_or(6), v.abs());
            numeric(body, v.is_sign_negative() && v != 0.0, "")
        }
        'e' | 'E' => {
            let v = arg.number();
            let body = scientific(v.abs(), spec.precision.unwrap_or(6), conv == 'E');
            numeric(body, v.is_sign_negative() && v != 0.0, "")
        }
        'g' | 'G' => {
            let v = arg.number();
            let body = general(v.abs(), spec.precision.unwrap_or(6), spec.alt, conv == 'G');
            numeric(body, v.is_sign_negative() && v != 0.0, "")
        }
        'x' | 'X' | 'o' => {
            let v = arg.number().trunc() as i64;
            let (body, prefix) = match conv {
                'x' => (format!("{:x}", v.unsigned_abs()), "0x"),
                'X' => (format!("{:X}", v.unsigned_abs()), "0X"),
                _ => (format!("{:o}", v.unsigned_abs()), "0"),
            };
            let prefix = if spec.alt && v != 0 { prefix } else { "" };
            numeric(body, v < 0, prefix)
        }
        'c' => {
            let c = match arg {
                FormatArg::Number(n) => char::from_u32(n as u32).unwrap_or(' '),
                FormatArg::Text(t) => t.chars().next().unwrap_or(' '),
            };
            pad_text(&c.to_string(), spec)
        }
        's' => {
            let text = arg.text();
            let text = match spec.precision {
                Some(p) => text.chars().take(p).collect(),
                None => text,
            };
            pad_text(&text, spec)
        }
        _ => return None,
    };
    Some(s)
}

fn pad_text(text: &str, spec: Spec) -> String {
    let len = text.chars().count();
    if len >= spec.width {
        return text.to_string();
    }
    let fill = " ".repeat(spec.width - len);
    if spec.left {
        format!("{text}{fill}")
    } else {
        format!("{fill}{text}")
    }
}

fn pad_numeric(sign: &str, prefix: &str, body: &str, spec: Spec) -> String {
    let len = sign.len() + prefix.len() + body.len();
    if len >= spec.width {
        return format!("{sign}{prefix}{body}");
    }
    let fill = spec.width - len;
    if spec.left {
        format!("{sign}{prefix}{body}{}", " ".repeat(fill))
    } else if spec.zero {
        format!("{sign}{prefix}{}{body}", "0".repeat(fill))
    } else {
        format!("{}{sign}{prefix}{body}", " ".repeat(fill))
    }
}

/// `d.ddde+XX` with at least two exponent digits.
fn scientific(v: f64, precision: usize, upper: bool) -> String {
    let raw = format!("{:.*e}", precision, v);
    let (mantissa, exp) = raw.split_once('e').unwrap_or((raw.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let e = if upper { 'E' } else { 'e' };
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{mantissa}{e}{sign}{:02}", exp.abs())
}

/// `%g`: fixed or scientific depending on the exponent, trailing zeros
/// removed unless `alt`.
fn general(v: f64, precision: usize, alt: bool, upper: bool) -> String {
    let p = precision.max(1);
    if v == 0.0 {
        return if alt {
            format!("{:.*}", p - 1, 0.0)
        } else {
            "0".to_string()
        };
    }
    let sci = scientific(v, p - 1, upper);
    let exp: i32 = sci
        .rsplit_once(['e', 'E'])
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);
    if exp < -4 || exp >= p as i32 {
        if alt {
            return sci;
        }
        let marker = if upper { 'E' } else { 'e' };
        match sci.split_once(marker) {
            Some((m, e)) => format!("{}{marker}{e}", strip_fraction_zeros(m)),
            None => sci,
        }
    } else {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        let fixed = format!("{v:.decimals$}");
        if alt {
            fixed
        } else {
            strip_fraction_zeros(&fixed).to_string()
        }
    }
}

fn strip_fraction_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(fmt: &str, v: f64) -> String {
        sprintf(fmt, FormatArg::Number(v))
    }

    fn t(fmt: &str, v: &str) -> String {
        sprintf(fmt, FormatArg::Text(v))
    }

    #[test]
    fn integers() {
        assert_eq!(n("%d", 42.9), "42");
        assert_eq!(n("%5d", -42.0), "  -42");
        assert_eq!(n("%-5d|", 42.0), "42   |");
        assert_eq!(n("%05d", -42.0), "-0042");
        assert_eq!(n("%+d", 7.0), "+7");
        assert_eq!(n("%.3d", 7.0), "007");
        assert_eq!(n("%ld items", 3.0), "3 items");
    }

    #[test]
    fn floats() {
        assert_eq!(n("%.2f", 3.14159), "3.14");
        assert_eq!(n("%f", 1.5), "1.500000");
        assert_eq!(n("%8.2f", -1.5), "   -1.50");
        assert_eq!(n("%08.2f", 1.5), "00001.50");
        assert_eq!(n("$%.2f", 1234.5), "$1234.50");
    }

    #[test]
    fn scientific_and_general() {
        assert_eq!(n("%e", 1500.0), "1.500000e+03");
        assert_eq!(n("%.2E", 0.000123), "1.23E-04");
        assert_eq!(n("%g", 100000.0), "100000");
        assert_eq!(n("%g", 1000000.0), "1e+06");
        assert_eq!(n("%g", 0.0001), "0.0001");
        assert_eq!(n("%g", 0.00001), "1e-05");
        assert_eq!(n("%g", 2.5), "2.5");
        assert_eq!(n("%g", 0.0), "0");
    }

    #[test]
    fn hex_octal_char() {
        assert_eq!(n("%x", 255.0), "ff");
        assert_eq!(n("%#X", 255.0), "0XFF");
        assert_eq!(n("%o", 8.0), "10");
        assert_eq!(n("%c", 65.0), "A");
        assert_eq!(t("%c", "xyz"), "x");
    }

    #[test]
    fn strings() {
        assert_eq!(t("Name: %s", "Ada"), "Name: Ada");
        assert_eq!(t("[%6s]", "ab"), "[    ab]");
        assert_eq!(t("[%-6s]", "ab"), "[ab    ]");
        assert_eq!(t("%.3s", "abcdef"), "abc");
        assert_eq!(n("%s", 2.5), "2.5");
        assert_eq!(t("%d", "12"), "12");
    }

    #[test]
    fn literal_percent_and_extra_conversions() {
        assert_eq!(n("%.1f%%", 12.34), "12.3%");
        assert_eq!(n("%d/%d", 3.0), "3/0");
        assert_eq!(n("100%", 1.0), "100%");
        assert_eq!(n("%y", 1.0), "%y");
    }

    #[test]
    fn number_text_forms() {
        assert_eq!(number_text(3.0), "3");
        assert_eq!(number_text(-12.0), "-12");
        assert_eq!(number_text(0.1 + 0.2), "0.3");
        assert_eq!(number_text(2.75), "2.75");
        assert_eq!(number_text(-0.00000000001), "0");
    }

    #[test]
    fn builtin_tags() {
        assert_eq!(builtin_function("money"), Some("formatMoney"));
        assert_eq!(builtin_function("percent"), Some("formatPrcnt"));
        assert_eq!(builtin_function("nope"), None);
    }
}
