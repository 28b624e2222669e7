//! Hard-mode compatibility table.
//!
//! `C[p, q] = true` iff every trit of `p` is `>=` the corresponding trit of
//! `q`. Used only in hard mode: if an earlier guess produced feedback `q`,
//! a still-legal future guess must produce a code `p` for which `C[p, q]`
//! holds, i.e. every green/yellow already observed is preserved.

use crate::feedback::{code_to_trits, CODE_COUNT};

pub struct CompatTable {
    // table[p * CODE_COUNT + q]
    table: Vec<bool>,
}

impl CompatTable {
    pub fn build() -> CompatTable {
        let mut table = vec![false; CODE_COUNT * CODE_COUNT];

        for p in 0..CODE_COUNT {
            let p_trits = code_to_trits(p as u8);
            for q in 0..CODE_COUNT {
                let q_trits = code_to_trits(q as u8);
                let compatible = p_trits.iter().zip(q_trits.iter()).all(|(pt, qt)| pt >= qt);
                table[p * CODE_COUNT + q] = compatible;
            }
        }

        CompatTable { table }
    }

    #[inline]
    pub fn get(&self, p: u8, q: u8) -> bool {
        self.table[p as usize * CODE_COUNT + q as usize]
    }
}
