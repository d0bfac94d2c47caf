use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::error::FetchError;

pub const NO_PRODUCTS_FOUND: &str = "No Products Found";

const KEPT_EXTENSIONS: [&str; 2] = [".lbl", ".img"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogListing {
    pub records: Vec<Value>,
    pub urls: Vec<String>,
}

pub fn parse_response(response: &Value) -> Result<CatalogListing, FetchError> {
    let products = response
        .get("ODEResults")
        .and_then(|value| value.get("Products"))
        .ok_or_else(|| FetchError::MalformedResponse("missing ODEResults.Products".to_string()))?;

    if products.as_str() == Some(NO_PRODUCTS_FOUND) {
        return Err(FetchError::NoProductFound);
    }

    let products = products
        .get("Product")
        .ok_or_else(|| FetchError::MalformedResponse("missing Products.Product".to_string()))?;
    let products = one_or_many(products, "Product")?;
    info!(count = products.len(), "products found");

    let mut listing = CatalogListing::default();
    for product in products {
        listing.records.push(product.clone());

        let files = product
            .get("Product_files")
            .and_then(|value| value.get("Product_file"))
            .ok_or_else(|| {
                FetchError::MalformedResponse("missing Product_files.Product_file".to_string())
            })?;
        for file in one_or_many(files, "Product_file")? {
            let url = file
                .get("URL")
                .and_then(|value| value.as_str())
                .ok_or_else(|| {
                    FetchError::MalformedResponse("product file without URL".to_string())
                })?;
            if is_product_file(url) {
                listing.urls.push(url.to_string());
            }
        }
    }
    Ok(listing)
}

pub fn is_product_file(url: &str) -> bool {
    let lower = url.to_lowercase();
    KEPT_EXTENSIONS.iter().any(|ext| lower.contains(ext))
}

fn one_or_many<'a>(value: &'a Value, field: &str) -> Result<Vec<&'a Value>, FetchError> {
    match value {
        Value::Array(items) => {
            if let Some(item) = items.iter().find(|item| !item.is_object()) {
                return Err(FetchError::MalformedResponse(format!(
                    "{field} entry is not an object: {item}"
                )));
            }
            Ok(items.iter().collect())
        }
        Value::Object(_) => Ok(vec![value]),
        other => Err(FetchError::MalformedResponse(format!(
            "{field} is neither an object nor an array: {other}"
        ))),
    }
}
