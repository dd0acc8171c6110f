//! `pchoque implementacion`: an advisor's implementation form from the
//! command line.

use plan_choque_client::{ChainedCredentials, StaticToken};
use plan_choque_config::Settings;
use plan_choque_kpi::draft::ProductDraft;
use plan_choque_kpi::Product;

use crate::render::number;
use crate::{settings, CliError};

/// Parse `referencia=20W50,cajas=4,galones=50[,marca=..][,presentacion=..][,pvp=..][,sugerido=..][,comentario=..]`.
pub fn parse_product(fields: &str) -> Result<Product, String> {
    let mut product = Product::default();
    for pair in fields.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got '{}'", pair))?;
        let value = value.trim();
        let num = || value.parse::<f64>().map_err(|_| format!("{}: '{}' is not a number", key, value));
        match key.trim() {
            "referencia" | "ref" => product.referencia = value.to_string(),
            "marca" => product.marca = value.to_string(),
            "presentacion" => product.presentacion = value.to_string(),
            "cajas" => product.numero_cajas = num()?,
            "galones" => product.volumen_galones = num()?,
            "pvp" => product.pvp_real = num()?,
            "sugerido" => product.pvp_sugerido = num()?,
            "comentario" => product.comentario_venta = Some(value.to_string()),
            other => return Err(format!("unknown product field '{}'", other)),
        }
    }
    Ok(product)
}

pub fn build_draft(pdv: &str, products: Vec<Product>) -> Result<ProductDraft, CliError> {
    let mut draft = ProductDraft::new(pdv.trim());
    for product in products {
        let referencia = product.referencia.clone();
        draft
            .add(product)
            .map_err(|e| CliError::usage(format!("product '{}': {}", referencia, e)))?;
    }
    Ok(draft)
}

pub fn cmd_implementacion(
    settings: &Settings,
    pdv: &str,
    products: Vec<Product>,
    token: Option<String>,
    dry_run: bool,
) -> Result<(), CliError> {
    let mut draft = build_draft(pdv, products)?;
    let total = draft.total_galones();
    let payload = draft.take_payload().map_err(|e| CliError::usage(e.to_string()))?;

    if dry_run {
        let text = serde_json::to_string_pretty(&payload)
            .map_err(|e| CliError::error(format!("failed to encode payload: {}", e)))?;
        println!("{}", text);
        return Ok(());
    }

    let client = match token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(token) => settings::client(settings, StaticToken(token.to_string()))?,
        None => settings::client(settings, ChainedCredentials::standard())?,
    };
    client.submit_implementation(&payload).map_err(CliError::api)?;

    eprintln!(
        "Implementación registrada: PDV {}, {} producto(s), {} galones",
        payload.pdv_id,
        payload.productos.len(),
        number(total)
    );
    Ok(())
}
