use serde_yaml::Value;
use std::fmt;

/// 参数值类型枚举，支持递归结构
///
/// 渲染规则与 Python 的 `str()` 一致：顶层字符串原样输出，列表和映射内部的
/// 字符串带引号，布尔值为 `True`/`False`，空值为 `None`。
#[derive(Clone, PartialEq)]
pub enum ParameterValue {
    // ————————————————————————————————————————————————————————————————————————
    // 基本参数值类型，包含字符串、数字、布尔值、空值
    // ————————————————————————————————————————————————————————————————————————
    Basic(BasicParameterValue),
    // ————————————————————————————————————————————————————————————————————————
    // 参数值列表，例如 img_size: [640, 640]
    // ————————————————————————————————————————————————————————————————————————
    List(Vec<ParameterValue>),
    // 嵌套映射，保留文件中的键顺序；键保留原始类型（1 与 '1' 渲染不同）
    Map(Vec<(ParameterValue, ParameterValue)>),
}

/// 基本参数值类型，只包含标量
#[derive(Clone, PartialEq)]
pub enum BasicParameterValue {
    String(String), // 字符串类型参数值
    Float(f64),     // 浮点数类型参数值
    Int(i64),       // 整数类型参数值
    Bool(bool),     // 布尔类型参数值
    Null,           // YAML 中的 null / ~ / 空值
}

impl BasicParameterValue {
    /// 顶层渲染（`str()`），字符串不加引号
    pub fn to_string_repr(&self) -> String {
        match self {
            BasicParameterValue::String(s) => s.clone(),
            other => other.to_quoted_repr(),
        }
    }

    /// 嵌套在容器里的渲染（`repr()`），字符串加引号
    fn to_quoted_repr(&self) -> String {
        match self {
            BasicParameterValue::String(s) => quote_string(s),
            BasicParameterValue::Float(n) => format_float(*n),
            BasicParameterValue::Int(n) => n.to_string(),
            BasicParameterValue::Bool(true) => "True".to_string(),
            BasicParameterValue::Bool(false) => "False".to_string(),
            BasicParameterValue::Null => "None".to_string(),
        }
    }
}

/// 浮点数的最短可还原表示
///
/// 十进制指数在 [-4, 16) 之间用定点形式，整数值保留 ".0"；
/// 其余用科学计数法，指数至少两位并带符号，例如 `1e-05`、`1e+16`。
fn format_float(n: f64) -> String {
    if n.is_nan() {
        return "nan".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }

    // `{:e}` 给出最短尾数，例如 "1e-5"、"-1.5e7"、"0e0"
    let scientific = format!("{:e}", n);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if (-4..16).contains(&exponent) {
        let fixed = n.to_string();
        if fixed.contains('.') { fixed } else { format!("{}.0", fixed) }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    }
}

/// 字符串加引号：默认单引号，包含单引号且不含双引号时改用双引号
fn quote_string(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let code = c as u32;
                if code < 0x100 {
                    out.push_str(&format!("\\x{:02x}", code));
                } else {
                    out.push_str(&format!("\\u{:04x}", code));
                }
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// 为BasicParameterValue实现Debug trait，使用Display的格式
impl fmt::Debug for BasicParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for BasicParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_repr())
    }
}

impl ParameterValue {
    /// 转换为上报给跟踪存储的参数字符串
    pub fn to_param_string(&self) -> String {
        match self {
            ParameterValue::Basic(basic_value) => basic_value.to_string_repr(),
            nested => nested.to_quoted_repr(),
        }
    }

    fn to_quoted_repr(&self) -> String {
        match self {
            ParameterValue::Basic(basic_value) => basic_value.to_quoted_repr(),
            ParameterValue::List(list) => {
                let items: Vec<String> = list.iter().map(|item| item.to_quoted_repr()).collect();
                format!("[{}]", items.join(", "))
            }
            ParameterValue::Map(entries) => {
                let items: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.to_quoted_repr(), v.to_quoted_repr()))
                    .collect();
                format!("{{{}}}", items.join(", "))
            }
        }
    }

    /// 将 serde_yaml::Value 转换为 ParameterValue（递归，不会失败）
    pub fn from_yaml(value: &Value) -> ParameterValue {
        match value {
            Value::String(s) => ParameterValue::Basic(BasicParameterValue::String(s.clone())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ParameterValue::Basic(BasicParameterValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    ParameterValue::Basic(BasicParameterValue::Float(f))
                } else {
                    ParameterValue::Basic(BasicParameterValue::String(n.to_string()))
                }
            }
            Value::Bool(b) => ParameterValue::Basic(BasicParameterValue::Bool(*b)),
            Value::Null => ParameterValue::Basic(BasicParameterValue::Null),
            Value::Sequence(seq) => ParameterValue::List(seq.iter().map(ParameterValue::from_yaml).collect()),
            Value::Mapping(map) => ParameterValue::Map(
                map.iter()
                    .map(|(k, v)| (ParameterValue::from_yaml(k), ParameterValue::from_yaml(v)))
                    .collect(),
            ),
            // Ignore YAML tags, just convert the inner value
            Value::Tagged(tagged) => ParameterValue::from_yaml(&tagged.value),
        }
    }
}

/// 把标量类型的 YAML 键转换为参数名；null 与复杂键返回 None
pub fn scalar_key_string(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(_) | Value::Bool(_) => Some(ParameterValue::from_yaml(key).to_param_string()),
        Value::Tagged(tagged) => scalar_key_string(&tagged.value),
        _ => None,
    }
}

/// 为ParameterValue实现Debug trait，使用Display的格式
impl fmt::Debug for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_param_string())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn test_basic_parameter_value_display() {
        let string_value = BasicParameterValue::String("runs/train".to_string());
        assert_eq!(format!("{}", string_value), "runs/train");

        let float_value = BasicParameterValue::Float(0.00001);
        assert_eq!(format!("{}", float_value), "1e-05");

        let int_value = BasicParameterValue::Int(300);
        assert_eq!(format!("{}", int_value), "300");

        assert_eq!(format!("{}", BasicParameterValue::Bool(false)), "False");
        assert_eq!(format!("{}", BasicParameterValue::Bool(true)), "True");
        assert_eq!(format!("{}", BasicParameterValue::Null), "None");
    }

    #[test]
    fn test_float_formatting() {
        let cases = [
            (0.0, "0.0"),
            (-0.0, "-0.0"),
            (1.0, "1.0"),
            (-3.0, "-3.0"),
            (0.937, "0.937"),
            (0.0001, "0.0001"),
            (0.00001, "1e-05"),
            (-1.5e-7, "-1.5e-07"),
            (1e15, "1000000000000000.0"),
            (1e16, "1e+16"),
            (2.5e100, "2.5e+100"),
            (f64::INFINITY, "inf"),
            (f64::NEG_INFINITY, "-inf"),
            (f64::NAN, "nan"),
        ];
        for (value, expected) in cases {
            assert_eq!(BasicParameterValue::Float(value).to_string_repr(), expected, "{}", value);
        }
    }

    #[test]
    fn test_from_yaml_scalars() {
        assert_eq!(
            ParameterValue::from_yaml(&yaml("0.01")),
            ParameterValue::Basic(BasicParameterValue::Float(0.01))
        );
        assert_eq!(
            ParameterValue::from_yaml(&yaml("16")),
            ParameterValue::Basic(BasicParameterValue::Int(16))
        );
        assert_eq!(
            ParameterValue::from_yaml(&yaml("~")),
            ParameterValue::Basic(BasicParameterValue::Null)
        );
        assert_eq!(
            ParameterValue::from_yaml(&yaml("'640'")),
            ParameterValue::Basic(BasicParameterValue::String("640".to_string()))
        );
    }

    #[test]
    fn test_from_yaml_nested_rendering() {
        let value = ParameterValue::from_yaml(&yaml("[640, 640]"));
        assert_eq!(value.to_param_string(), "[640, 640]");

        let value = ParameterValue::from_yaml(&yaml("[plate, car]"));
        assert_eq!(value.to_param_string(), "['plate', 'car']");

        let value = ParameterValue::from_yaml(&yaml("{lr: 0.01, sched: [cos, 1.0], warm: true, last: ~}"));
        assert_eq!(
            value.to_param_string(),
            "{'lr': 0.01, 'sched': ['cos', 1.0], 'warm': True, 'last': None}"
        );

        // 键保留原始类型
        let value = ParameterValue::from_yaml(&yaml("{1: a, true: b, '2': c}"));
        assert_eq!(value.to_param_string(), "{1: 'a', True: 'b', '2': 'c'}");
    }

    #[test]
    fn test_nested_string_quoting() {
        let list = |items: &[&str]| {
            ParameterValue::List(
                items
                    .iter()
                    .map(|s| ParameterValue::Basic(BasicParameterValue::String(s.to_string())))
                    .collect(),
            )
        };
        assert_eq!(list(&["it's"]).to_param_string(), r#"["it's"]"#);
        assert_eq!(list(&[r#"it's "x""#]).to_param_string(), r#"['it\'s "x"']"#);
        assert_eq!(list(&["a\\b\tc\n"]).to_param_string(), r"['a\\b\tc\n']");
        assert_eq!(list(&[""]).to_param_string(), "['']");
    }

    #[test]
    fn test_scalar_key_string() {
        assert_eq!(scalar_key_string(&yaml("lr0")), Some("lr0".to_string()));
        assert_eq!(scalar_key_string(&yaml("3")), Some("3".to_string()));
        assert_eq!(scalar_key_string(&yaml("true")), Some("True".to_string()));
        assert_eq!(scalar_key_string(&yaml("~")), None);
        assert_eq!(scalar_key_string(&yaml("[a, b]")), None);
    }

    #[test]
    fn test_debug_equals_display() {
        let list_value = ParameterValue::List(vec![
            ParameterValue::Basic(BasicParameterValue::Int(1)),
            ParameterValue::Basic(BasicParameterValue::String("two".to_string())),
        ]);
        assert_eq!(format!("{:?}", list_value), format!("{}", list_value));
        assert_eq!(format!("{}", list_value), "[1, 'two']");
    }
}
