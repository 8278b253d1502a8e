//! Pre-composed middleware chain

use super::{Handler, Middleware, Next};
use crate::core::{Fields, LogContext, Record, Result};
use std::fmt;
use std::sync::Arc;

/// An immutable, ordered middleware list composed around a terminal handler
///
/// The composition happens once, when the chain is built; `handle` just
/// calls the composed function. Deriving a chain (`with`, `with_attrs`,
/// `with_group`) builds a new one and leaves `self` untouched, so a chain
/// can be shared across threads while others derive from it. Derived
/// chains share the middleware list of their parent.
///
/// Middleware instances are shared by every chain holding them, so any
/// per-instance state (such as a sampling counter) is shared too.
#[derive(Clone)]
pub struct MiddlewareChain {
    middleware: Arc<[Arc<dyn Middleware>]>,
    base: Arc<dyn Handler>,
    /// Attributes added by `with_attrs`, keys already group-qualified
    attrs: Fields,
    groups: Vec<String>,
    composed: Next,
}

impl MiddlewareChain {
    pub fn new(middleware: Vec<Arc<dyn Middleware>>, terminal: Arc<dyn Handler>) -> Self {
        Self::assemble(middleware.into(), terminal, Fields::new(), Vec::new())
    }

    fn assemble(
        middleware: Arc<[Arc<dyn Middleware>]>,
        base: Arc<dyn Handler>,
        attrs: Fields,
        groups: Vec<String>,
    ) -> Self {
        let terminal: Arc<dyn Handler> = if attrs.is_empty() && groups.is_empty() {
            Arc::clone(&base)
        } else {
            Arc::new(Derived {
                inner: Arc::clone(&base),
                attrs: attrs.clone(),
                prefix: (!groups.is_empty()).then(|| groups.join(".")),
            })
        };
        let composed = compose(&middleware, terminal);

        Self {
            middleware,
            base,
            attrs,
            groups,
            composed,
        }
    }

    /// Run `record` through the chain
    ///
    /// A record dropped by a middleware yields `Ok(())`.
    pub fn handle(&self, ctx: &LogContext, record: Record) -> Result<()> {
        (self.composed)(ctx, record)
    }

    /// A new chain with `middleware` appended innermost
    #[must_use]
    pub fn with(&self, middleware: Arc<dyn Middleware>) -> Self {
        let mut list: Vec<Arc<dyn Middleware>> = self.middleware.iter().cloned().collect();
        list.push(middleware);
        Self::assemble(
            list.into(),
            Arc::clone(&self.base),
            self.attrs.clone(),
            self.groups.clone(),
        )
    }

    /// A new chain attaching `attrs` to every record
    ///
    /// Keys are qualified by the groups opened so far. Fields on the record
    /// itself win over attributes with the same key.
    #[must_use]
    pub fn with_attrs(&self, attrs: Fields) -> Self {
        if attrs.is_empty() {
            return self.clone();
        }

        let mut qualified = attrs;
        if !self.groups.is_empty() {
            qualified.qualify(&self.groups.join("."));
        }

        let mut merged = self.attrs.clone();
        for (key, value) in qualified.iter() {
            merged.insert(key, value.clone());
        }

        Self::assemble(
            Arc::clone(&self.middleware),
            Arc::clone(&self.base),
            merged,
            self.groups.clone(),
        )
    }

    /// A new chain namespacing record fields under `name`
    ///
    /// Fields reaching the terminal are prefixed with every open group,
    /// for example `http.request.status`. An empty name returns the chain
    /// unchanged.
    #[must_use]
    pub fn with_group(&self, name: impl Into<String>) -> Self {
        let name = name.into();
        if name.is_empty() {
            return self.clone();
        }

        let mut groups = self.groups.clone();
        groups.push(name);
        Self::assemble(
            Arc::clone(&self.middleware),
            Arc::clone(&self.base),
            self.attrs.clone(),
            groups,
        )
    }

    /// Number of middleware in the chain
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("middleware", &self.middleware.len())
            .field("attrs", &self.attrs)
            .field("groups", &self.groups)
            .finish()
    }
}

/// Wrap `terminal` so that `middleware[0]` is outermost
fn compose(middleware: &[Arc<dyn Middleware>], terminal: Arc<dyn Handler>) -> Next {
    let last: Next = Arc::new(move |_ctx: &LogContext, record: Record| terminal.handle(record));

    middleware.iter().rev().fold(last, |next, mw| {
        let mw = Arc::clone(mw);
        Arc::new(move |ctx: &LogContext, record: Record| mw.handle(ctx, record, &next))
    })
}

/// Terminal applying group prefix and attributes before the real handler
struct Derived {
    inner: Arc<dyn Handler>,
    attrs: Fields,
    prefix: Option<String>,
}

impl Handler for Derived {
    fn handle(&self, mut record: Record) -> Result<()> {
        if let Some(prefix) = &self.prefix {
            record.fields.qualify(prefix);
        }

        let mut fields = self.attrs.clone();
        for (key, value) in record.fields.iter() {
            fields.insert(key, value.clone());
        }
        record.fields = fields;

        self.inner.handle(record)
    }
}
