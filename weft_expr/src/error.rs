//! Error types for expression evaluation.

/// Errors raised while evaluating an expression against data.
///
/// Every variant names the offending expression so callers can report
/// the failure without keeping the source text around.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    /// Expression does not conform to the grammar.
    #[error("Unable to parse expression \"{expression}\": {reason}")]
    Syntax {
        /// Source text of the expression
        expression: String,
        /// Parser message
        reason: String,
    },

    /// Expression references a variable missing from the data.
    #[error("Variable \"{name}\" is undefined in expression \"{expression}\"")]
    UndefinedVariable {
        /// Source text of the expression
        expression: String,
        /// Name of the missing variable
        name: String,
    },

    /// Operand types are not valid for the operation.
    #[error("Type error in expression \"{expression}\": {reason}")]
    TypeMismatch {
        /// Source text of the expression
        expression: String,
        /// Description of the mismatch
        reason: String,
    },

    /// Expression calls a function the evaluator does not provide.
    #[error("Unknown function \"{name}\" in expression \"{expression}\"")]
    UnknownFunction {
        /// Source text of the expression
        expression: String,
        /// Name of the function
        name: String,
    },
}

impl ExpressionError {
    /// Returns the source text of the failing expression.
    pub fn expression(&self) -> &str {
        match self {
            ExpressionError::Syntax { expression, .. }
            | ExpressionError::UndefinedVariable { expression, .. }
            | ExpressionError::TypeMismatch { expression, .. }
            | ExpressionError::UnknownFunction { expression, .. } => expression,
        }
    }
}

/// Failure raised inside the parser or interpreter before the
/// expression text is attached.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Fault {
    Syntax(String),
    Undefined(String),
    Type(String),
    UnknownFunction(String),
}

impl Fault {
    pub(crate) fn into_error(self, expression: &str) -> ExpressionError {
        let expression = expression.to_string();
        match self {
            Fault::Syntax(reason) => ExpressionError::Syntax { expression, reason },
            Fault::Undefined(name) => ExpressionError::UndefinedVariable { expression, name },
            Fault::Type(reason) => ExpressionError::TypeMismatch { expression, reason },
            Fault::UnknownFunction(name) => ExpressionError::UnknownFunction { expression, name },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Fault::Undefined("foo".to_string()).into_error("<% foo %>");
        assert_eq!(
            err.to_string(),
            "Variable \"foo\" is undefined in expression \"<% foo %>\""
        );
        assert_eq!(err.expression(), "<% foo %>");
    }
}
