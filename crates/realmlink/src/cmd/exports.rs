use std::time::Duration;

use realmlink_codec::{ErrorValue, Function, Value};

/// Exports offered by `serve` and by the server side of `demo`.
pub fn builtin_exports() -> Value {
    Value::record([
        ("add", Value::from(add())),
        ("echo", Value::from(echo())),
        ("sleep", Value::from(sleep())),
        ("fail", Value::from(fail())),
        (
            "info",
            Value::record([
                ("name", Value::from("realmlink")),
                ("version", Value::from(env!("CARGO_PKG_VERSION"))),
            ]),
        ),
    ])
}

fn number_arg(args: &[Value], index: usize) -> Result<f64, Value> {
    args.get(index).and_then(Value::as_number).ok_or_else(|| {
        Value::from(
            ErrorValue::new(format!("argument {index} must be a number")).with_name("TypeError"),
        )
    })
}

/// `(a, b) => a + b`
pub fn add() -> Function {
    Function::new_async(2, |args| {
        let sum = number_arg(&args, 0).and_then(|a| number_arg(&args, 1).map(|b| a + b));
        async move { sum.map(Value::from) }
    })
}

/// Resolves with its first argument.
fn echo() -> Function {
    Function::new_async(1, |args| async move {
        Ok(args.into_iter().next().unwrap_or_default())
    })
}

/// Resolves with `ms` after waiting that many milliseconds.
fn sleep() -> Function {
    Function::new_async(1, |args| {
        let ms = number_arg(&args, 0);
        async move {
            let ms = match ms {
                Ok(ms) => ms.max(0.0),
                Err(reason) => return Err(reason),
            };
            tokio::time::sleep(Duration::from_millis(ms as u64)).await;
            Ok(Value::from(ms))
        }
    })
}

/// Always rejects with an error carrying `message`.
fn fail() -> Function {
    Function::new_async(1, |args| async move {
        let message = args.first().and_then(Value::as_str).unwrap_or("failed").to_string();
        Err(Value::from(ErrorValue::new(message)))
    })
}
