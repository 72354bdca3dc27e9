use crate::tensor::{Dims, ITensor, Tensor, TensorView, TensorViewMut};
use std::fmt::{Debug, Formatter, Write};

/// Rows (and values within a row) beyond this are elided from the middle.
const PREVIEW_LEN: usize = 6;

fn fmt_elided<T>(
    items: &[T],
    f: &mut Formatter<'_>,
    sep: &str,
    mut fmt_item: impl FnMut(&T, &mut Formatter<'_>) -> std::fmt::Result,
) -> std::fmt::Result {
    let half = PREVIEW_LEN / 2;
    let (head, tail) = if items.len() > PREVIEW_LEN {
        (&items[..half], &items[items.len() - half..])
    } else {
        (items, &items[items.len()..])
    };
    for (i, item) in head.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        fmt_item(item, f)?;
    }
    if !tail.is_empty() {
        write!(f, "{sep}..{} more..", items.len() - PREVIEW_LEN)?;
        for item in tail {
            f.write_str(sep)?;
            fmt_item(item, f)?;
        }
    }
    Ok(())
}

fn fmt_row<T: Debug>(row: &[T], f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_char('[')?;
    fmt_elided(row, f, ", ", |v, f| Debug::fmt(v, f))?;
    f.write_char(']')
}

/// Prints the shape and the element type, then one line per outer-axis entry with the
/// remaining axes flattened.
fn format_tensor<T: Debug, D: Dims>(data: &[T], dims: &D, f: &mut Formatter<'_>) -> std::fmt::Result {
    let type_name = std::any::type_name::<T>();
    write!(f, "Tensor{dims}<{}> ", type_name.rsplit("::").next().unwrap_or(type_name))?;
    let rows = dims.first();
    if D::N < 2 || rows == 0 || data.is_empty() {
        return fmt_row(data, f);
    }
    let row_len = data.len() / rows;
    let rows: Vec<&[T]> = data.chunks(row_len).collect();
    f.write_str("[\n  ")?;
    fmt_elided(&rows, f, ",\n  ", |row, f| fmt_row(row, f))?;
    f.write_str("\n]")
}

impl<T: Debug, D: Dims> Debug for Tensor<T, D> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        format_tensor(self.as_ref(), self.dims(), f)
    }
}

impl<T: Debug, D: Dims> Debug for TensorView<'_, T, D> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        format_tensor(self.as_ref(), self.dims(), f)
    }
}

impl<T: Debug, D: Dims> Debug for TensorViewMut<'_, T, D> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        format_tensor(self.as_ref(), self.dims(), f)
    }
}
