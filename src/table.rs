//! Plain-text correspondence tables: whitespace separated integers, one row per line.
//!
//! `superpixel_to_segment_map.txt` holds `plane fine mid` rows and
//! `segment_to_body_map.txt` holds `mid body` rows. Blank lines and `#` comments are
//! skipped on read. A malformed line rejects the whole table.

use crate::error::{Error, Result};
use crate::hierarchy::PlaneTriple;
use std::io::{BufRead, Write};

fn parse_row<const N: usize>(line_i: usize, line: &str) -> Result<Option<[u32; N]>> {
    let line = line.split('#').next().unwrap_or("").trim();
    if line.is_empty() {
        return Ok(None);
    }

    let mut row = [0u32; N];
    let mut n = 0usize;
    for tok in line.split_whitespace() {
        if n == N {
            return Err(Error::Table {
                line: line_i,
                msg: format!("expected {N} columns, found more"),
            });
        }
        row[n] = tok.parse().map_err(|e| Error::Table {
            line: line_i,
            msg: format!("bad integer '{tok}': {e}"),
        })?;
        n += 1;
    }
    if n != N {
        return Err(Error::Table {
            line: line_i,
            msg: format!("expected {N} columns, found {n}"),
        });
    }
    Ok(Some(row))
}

fn read_rows<const N: usize, R: BufRead>(reader: R) -> Result<Vec<[u32; N]>> {
    let mut rows = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        if let Some(row) = parse_row::<N>(i + 1, &line?)? {
            rows.push(row);
        }
    }
    Ok(rows)
}

pub fn read_fine_to_mid<R: BufRead>(reader: R) -> Result<Vec<PlaneTriple>> {
    Ok(read_rows::<3, _>(reader)?
        .into_iter()
        .map(|[plane, fine, mid]| PlaneTriple { plane, fine, mid })
        .collect())
}

pub fn read_mid_to_body<R: BufRead>(reader: R) -> Result<Vec<(u32, u32)>> {
    Ok(read_rows::<2, _>(reader)?
        .into_iter()
        .map(|[mid, body]| (mid, body))
        .collect())
}

pub fn write_fine_to_mid<W: Write>(mut writer: W, rows: &[PlaneTriple]) -> Result<()> {
    for t in rows {
        writeln!(writer, "{} {} {}", t.plane, t.fine, t.mid)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_mid_to_body<W: Write>(mut writer: W, rows: &[(u32, u32)]) -> Result<()> {
    for (mid, body) in rows {
        writeln!(writer, "{mid} {body}")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_write_one_row_per_line() {
        let mut buf = Vec::new();
        write_fine_to_mid(
            &mut buf,
            &[
                PlaneTriple { plane: 0, fine: 0, mid: 0 },
                PlaneTriple { plane: 0, fine: 1, mid: 4 },
            ],
        )
        .unwrap();
        assert_eq!(String::from_utf8(buf.clone()).unwrap(), "0 0 0\n0 1 4\n");

        let back = read_fine_to_mid(buf.as_slice()).unwrap();
        assert_eq!(back[1], PlaneTriple { plane: 0, fine: 1, mid: 4 });

        let mut buf = Vec::new();
        write_mid_to_body(&mut buf, &[(0, 0), (4, 12)]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "0 0\n4 12\n");
    }

    #[test]
    fn reader_accepts_loose_whitespace_and_comments() {
        let text = "# mid body\n0\t0\n\n  7   3  \n8 3 # trailing\n";
        let rows = read_mid_to_body(text.as_bytes()).unwrap();
        assert_eq!(rows, vec![(0, 0), (7, 3), (8, 3)]);
    }

    #[test]
    fn malformed_lines_reject_the_table() {
        let err = read_mid_to_body("0 0\n1 2 3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Table { line: 2, .. }));

        let err = read_fine_to_mid("0 1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Table { line: 1, .. }));

        let err = read_mid_to_body("0 -1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Table { line: 1, .. }));
    }

    #[test]
    fn empty_table_reads_as_no_rows() {
        assert!(read_fine_to_mid("".as_bytes()).unwrap().is_empty());
    }
}
