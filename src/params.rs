use crate::types::Value;

/// Insertion-ordered parameter mapping for one statement.
///
/// Scalar fields are unique by name (last write wins, order of first
/// insertion preserved) because INSERT/UPDATE column order is taken from
/// this map. IN-lists live in a separate store so their synthetic entries
/// never show up among the field names: each list expands to placeholders
/// named `{field}_{k}`, where `k` comes from a per-builder running index,
/// plus a substitution rule applied to the filter clause before rendering:
/// the token `:{field}` is textually replaced by the parenthesized
/// placeholder list. A list whose token never occurs is inert; its entries
/// are left out of the driver bindings entirely.
#[derive(Debug, Clone, Default)]
pub struct ParamMap {
    fields: Vec<(String, Value)>,
    lists: Vec<InList>,
    next_index: usize,
}

#[derive(Debug, Clone)]
struct InList {
    field: String,
    items: Vec<(String, Value)>,
}

impl ParamMap {
    #[must_use]
    pub fn new() -> Self {
        ParamMap::default()
    }

    /// Upsert a scalar parameter, preserving first-insertion order.
    pub fn set(&mut self, field: &str, value: Value) {
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((field.to_string(), value)),
        }
        self.next_index += 1;
    }

    /// Bind a named IN-list as synthetic placeholder entries plus a filter
    /// substitution. Re-binding a list under the same field replaces its
    /// items.
    pub fn set_list<I>(&mut self, field: &str, values: I)
    where
        I: IntoIterator<Item = Value>,
    {
        let mut items = Vec::new();
        for value in values {
            items.push((format!("{}_{}", field, self.next_index), value));
            self.next_index += 1;
        }
        match self.lists.iter_mut().find(|list| list.field == field) {
            Some(list) => list.items = items,
            None => self.lists.push(InList {
                field: field.to_string(),
                items,
            }),
        }
    }

    /// Apply the IN-list substitution pass to a filter clause.
    ///
    /// Plain textual replacement, exactly where each `:{field}` token
    /// occurs; tokens that never occur leave their lists unused.
    #[must_use]
    pub fn substitute_lists(&self, filter: &str) -> String {
        let mut out = filter.to_string();
        for list in &self.lists {
            let placeholders: Vec<String> = list
                .items
                .iter()
                .map(|(name, _)| format!(":{name}"))
                .collect();
            out = out.replace(
                &format!(":{}", list.field),
                &format!("({})", placeholders.join(",")),
            );
        }
        out
    }

    /// Everything the driver should bind for one rendered statement: every
    /// field, plus the items of each list whose placeholders made it into
    /// the text. The scan is plain textual, mirroring the substitution
    /// pass, so an unsubstituted list contributes nothing.
    #[must_use]
    pub fn bindings<'a>(&'a self, sql: &str) -> Vec<(&'a str, &'a Value)> {
        let mut out: Vec<(&str, &Value)> = self
            .fields
            .iter()
            .map(|(name, value)| (name.as_str(), value))
            .collect();
        for list in &self.lists {
            for (name, value) in &list.items {
                if sql.contains(&format!(":{name}")) {
                    out.push((name.as_str(), value));
                }
            }
        }
        out
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Field names in insertion order (INSERT/UPDATE column order).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }
}
