use std::borrow::Cow;

/// Errors raised while normalizing handlers or configuring a queue.
///
/// Dispatch itself never fails: type mismatches, unknown unregister targets
/// and dropped channel deliveries are ordinary outcomes, not errors.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The value offered for registration is not a handler, a sequence of
    /// handlers, a channel, or a callable.
    #[error("Unsupported handler type{}: {message}", format_context(.context))]
    UnsupportedHandlerType { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A callable was offered that takes more than one parameter.
    #[error(
        "Unsupported handler shape{}: {message} (takes {arity} parameters, 0 or 1 permitted)",
        format_context(.context)
    )]
    UnsupportedHandlerShape {
        arity: usize,
        message: Cow<'static, str>,
        context: Option<Cow<'static, str>>,
    },

    /// Invalid settings supplied to the queue builder.
    #[error("Invalid queue configuration{}: {message}", format_context(.context))]
    InvalidConfiguration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

/// A specialized `Result` for dispatcher operations.
pub type Result<T, E = DispatchError> = std::result::Result<T, E>;

/// Adds `.context(..)` to dispatcher results.
pub trait DispatchErrorExt<T> {
    /// Attaches a human-readable context to the error, if any.
    ///
    /// # Errors
    /// Returns the original error with the context attached.
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T>;
}

impl<T> DispatchErrorExt<T> for Result<T> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Self {
        self.map_err(|mut e| {
            match &mut e {
                DispatchError::UnsupportedHandlerType { context: c, .. }
                | DispatchError::UnsupportedHandlerShape { context: c, .. }
                | DispatchError::InvalidConfiguration { context: c, .. } => {
                    *c = Some(context.into());
                },
            }
            e
        })
    }
}

impl DispatchError {
    pub(crate) fn unsupported_type(type_name: &'static str) -> Self {
        Self::UnsupportedHandlerType {
            message: format!("`{type_name}` is not a handler, sequence, channel, or callable")
                .into(),
            context: None,
        }
    }

    pub(crate) fn unsupported_shape(arity: usize, type_name: &'static str) -> Self {
        Self::UnsupportedHandlerShape {
            arity,
            message: Cow::Borrowed(type_name),
            context: None,
        }
    }
}

fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_without_context() {
        let err = DispatchError::unsupported_type("u8");
        assert_eq!(
            err.to_string(),
            "Unsupported handler type: `u8` is not a handler, sequence, channel, or callable"
        );
    }

    #[test]
    fn test_shape_display_reports_arity() {
        let err = DispatchError::unsupported_shape(2, "fn(&u8, &u8)");
        assert_eq!(
            err.to_string(),
            "Unsupported handler shape: fn(&u8, &u8) (takes 2 parameters, 0 or 1 permitted)"
        );
    }

    #[test]
    fn test_context_is_attached() {
        let result: Result<()> = Err(DispatchError::InvalidConfiguration {
            message: "name cannot be empty".into(),
            context: None,
        });

        let err = result.context("building ui queue").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid queue configuration (building ui queue): name cannot be empty"
        );
    }

    #[test]
    fn test_context_leaves_ok_untouched() {
        let result: Result<u8> = Ok(7);
        assert_eq!(result.context("unused").unwrap(), 7);
    }
}
