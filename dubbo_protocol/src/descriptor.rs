use crate::{Arg, Error, ErrorKind, Result};

fn primitive_code(tag: &str) -> Option<char> {
    match tag {
        "boolean" => Some('Z'),
        "int" => Some('I'),
        "short" => Some('S'),
        "long" => Some('J'),
        "double" => Some('D'),
        "float" => Some('F'),
        "byte" => Some('B'),
        "char" => Some('C'),
        _ => None,
    }
}

fn class_descriptor(name: &str) -> String {
    format!("L{};", name.replace('.', "/"))
}

/// Returns the JVM descriptor of a single argument type tag.
pub fn type_descriptor(tag: &str) -> Result<String> {
    if let Some(c) = primitive_code(tag) {
        return Ok(c.to_string());
    }
    if let Some(elem) = tag.strip_prefix('[') {
        return match primitive_code(elem) {
            Some(c) => Ok(format!("[{}", c)),
            None if !elem.is_empty() => Ok(format!("[{}", class_descriptor(elem))),
            None => Err(Error::new(ErrorKind::InvalidArgument, "empty array type")),
        };
    }
    if tag.contains('.') {
        return Ok(class_descriptor(tag));
    }
    Err(Error::new(
        ErrorKind::InvalidArgument,
        format!("unknown argument type: {:?}", tag),
    ))
}

/// Builds the parameter-type descriptor the provider uses to pick an overload.
///
/// Descriptors are concatenated in argument order, so `(int, String)` yields
/// `ILjava/lang/String;`. No arguments yield the empty string.
pub fn describe(args: &[Arg]) -> Result<String> {
    args.iter().map(|arg| type_descriptor(arg.class())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    #[test]
    fn primitives() {
        let args = vec![
            Arg::boolean(true),
            Arg::int(1),
            Arg::short(2),
            Arg::long(3),
            Arg::double(4.0),
            Arg::float(5.0),
        ];
        assert_eq!("ZISJDF", describe(&args).unwrap());
    }

    #[test]
    fn classes_and_arrays_keep_argument_order() {
        let args = vec![
            Arg::string("a"),
            Arg::new("[java.lang.String", Value::list(vec![])),
            Arg::int(1),
            Arg::object("com.example.Query", vec![]),
        ];
        assert_eq!(
            "Ljava/lang/String;[Ljava/lang/String;ILcom/example/Query;",
            describe(&args).unwrap()
        );
    }

    #[test]
    fn primitive_arrays() {
        assert_eq!("[J", type_descriptor("[long").unwrap());
    }

    #[test]
    fn no_arguments() {
        assert_eq!("", describe(&[]).unwrap());
    }

    #[test]
    fn rejects_unknown_bare_names() {
        let err = describe(&[Arg::new("integer", 1)]).unwrap_err();
        assert_eq!(ErrorKind::InvalidArgument, err.kind());
        assert_eq!(ErrorKind::InvalidArgument, type_descriptor("[").unwrap_err().kind());
    }
}
