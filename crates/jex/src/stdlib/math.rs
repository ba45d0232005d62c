//! Math built-ins over the decimal coercion.

use bigdecimal::RoundingMode;
use num_traits::ToPrimitive;

use crate::registry::FunctionRegistry;
use crate::stdlib::arg;
use crate::value::Value;

pub(crate) fn install(registry: &mut FunctionRegistry) {
    registry.register_builtin("abs", 1, Some(1), |_, args| {
        Ok(Value::Number(arg(&args, 0).coerce_number().abs()))
    });

    registry.register_builtin("min", 2, Some(2), |_, args| {
        let a = arg(&args, 0).coerce_number();
        let b = arg(&args, 1).coerce_number();
        Ok(Value::Number(if a <= b { a } else { b }))
    });

    registry.register_builtin("max", 2, Some(2), |_, args| {
        let a = arg(&args, 0).coerce_number();
        let b = arg(&args, 1).coerce_number();
        Ok(Value::Number(if a >= b { a } else { b }))
    });

    registry.register_builtin("round", 1, Some(2), |_, args| {
        let n = arg(&args, 0).coerce_number();
        let digits = args
            .get(1)
            .map(|d| d.coerce_number().with_scale_round(0, RoundingMode::Down).to_i64().unwrap_or(0))
            .unwrap_or(0);
        Ok(Value::Number(n.with_scale_round(digits, RoundingMode::HalfUp)))
    });

    registry.register_builtin("floor", 1, Some(1), |_, args| {
        Ok(Value::Number(
            arg(&args, 0).coerce_number().with_scale_round(0, RoundingMode::Floor),
        ))
    });

    registry.register_builtin("ceil", 1, Some(1), |_, args| {
        Ok(Value::Number(
            arg(&args, 0).coerce_number().with_scale_round(0, RoundingMode::Ceiling),
        ))
    });
}

#[cfg(test)]
mod tests {
    use bigdecimal::BigDecimal;

    use super::*;

    #[test]
    fn rounding_modes() {
        let n: BigDecimal = "15.497".parse().unwrap();
        assert_eq!(n.with_scale_round(2, RoundingMode::HalfUp).to_string(), "15.50");
        let neg: BigDecimal = "-1.5".parse().unwrap();
        assert_eq!(neg.with_scale_round(0, RoundingMode::Floor).to_string(), "-2");
        assert_eq!(neg.with_scale_round(0, RoundingMode::Ceiling).to_string(), "-1");
    }
}
