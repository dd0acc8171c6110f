//! Product rows an advisor adds while filling an implementation or price
//! report. The draft lives until it is submitted; taking the payload
//! empties it.

use serde::Serialize;

use crate::error::KpiError;
use crate::model::Product;

/// Body posted to the backend when the form is submitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImplementationPayload {
    pub pdv_id: String,
    pub productos: Vec<Product>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductDraft {
    pdv_id: String,
    rows: Vec<Product>,
    next_id: u64,
}

impl ProductDraft {
    pub fn new(pdv_id: impl Into<String>) -> Self {
        Self { pdv_id: pdv_id.into(), rows: Vec::new(), next_id: 1 }
    }

    pub fn pdv_id(&self) -> &str {
        &self.pdv_id
    }

    pub fn rows(&self) -> &[Product] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Validate and append a row; the draft assigns the row id.
    pub fn add(&mut self, mut product: Product) -> Result<&Product, KpiError> {
        validate(&product)?;
        product.id = format!("tmp-{}", self.next_id);
        product.tiene_comentarios = product
            .comentario_venta
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());
        self.next_id += 1;
        self.rows.push(product);
        Ok(&self.rows[self.rows.len() - 1])
    }

    /// Remove a row by id. Returns false when no row has that id.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.rows.len();
        self.rows.retain(|p| p.id != id);
        self.rows.len() != before
    }

    /// Sum of gallons across the rows, shown under the form table.
    pub fn total_galones(&self) -> f64 {
        self.rows.iter().map(|p| p.volumen_galones).sum()
    }

    /// Consume the rows into a submit payload.
    pub fn take_payload(&mut self) -> Result<ImplementationPayload, KpiError> {
        if self.rows.is_empty() {
            return Err(KpiError::EmptyDraft(self.pdv_id.clone()));
        }
        Ok(ImplementationPayload {
            pdv_id: self.pdv_id.clone(),
            productos: std::mem::take(&mut self.rows),
        })
    }
}

fn validate(p: &Product) -> Result<(), KpiError> {
    if p.referencia.trim().is_empty() {
        return Err(KpiError::InvalidProduct("referencia is required".into()));
    }
    let numbers = [
        ("numeroCajas", p.numero_cajas),
        ("pvpReal", p.pvp_real),
        ("pvpSugerido", p.pvp_sugerido),
        ("volumenGalones", p.volumen_galones),
    ];
    for (name, value) in numbers {
        if !value.is_finite() || value < 0.0 {
            return Err(KpiError::InvalidProduct(format!("{name} must be a non-negative number")));
        }
    }
    Ok(())
}
