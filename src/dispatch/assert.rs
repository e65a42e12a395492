//! Declared-type assertions on plain calls.

use super::{Callable, DeclaredType, Receiver};
use crate::error::Error;
use crate::value::Value;
use std::sync::Arc;

/// Wrap `func` so every argument with a concrete declared type is checked
/// before the call. Extra arguments and `Any` positions are not checked.
///
/// A callable whose declared types are all `Any` is returned unwrapped.
pub fn type_assert(name: &str, types: &[DeclaredType], func: Callable) -> Callable {
    if types.iter().all(DeclaredType::is_any) {
        return func;
    }

    let name = name.to_string();
    let types = types.to_vec();
    Arc::new(move |receiver: &Receiver<'_>, args: &[Value]| {
        for (index, (arg, declared)) in args.iter().zip(&types).enumerate() {
            if let DeclaredType::Of(tag) = declared {
                if !tag.matches(arg) {
                    return Err(Error::TypeMismatch {
                        name: name.clone(),
                        index,
                        expected: tag.to_string(),
                        actual: arg.type_tag().to_string(),
                    });
                }
            }
        }
        func(receiver, args)
    })
}
