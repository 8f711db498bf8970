use super::store::AttributionSnapshot;

/// The part of a lead form attribution needs to touch.
pub trait FormFields {
    /// Current value of the field called `name`, if the form has one.
    fn field_value(&self, name: &str) -> Option<String>;
    fn set_field_value(&mut self, name: &str, value: &str);
    fn append_hidden_field(&mut self, name: &str, value: &str);
}

/// Makes every snapshot key present in the form with the snapshot's value.
/// Fields that already match are left untouched.
pub fn sync_hidden_fields<F: FormFields + ?Sized>(form: &mut F, snapshot: &AttributionSnapshot) -> usize {
    let mut changed = 0;
    for (key, value) in snapshot.iter() {
        let name = key.param_name();
        match form.field_value(name) {
            Some(current) if current == value => {}
            Some(_) => {
                form.set_field_value(name, value);
                changed += 1;
            }
            None => {
                form.append_hidden_field(name, value);
                changed += 1;
            }
        }
    }
    changed
}
