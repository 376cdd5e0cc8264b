use crate::cli::LookupKind;
use crate::commands::common::{print_json, Session};
use crate::error::CliError;

pub async fn run_lookup(session: &Session, kind: LookupKind, json: bool) -> Result<(), CliError> {
    let catalog = session.context.catalog();

    let lines: Vec<String> = match kind {
        LookupKind::Brands => {
            let brands = catalog.brands().await?;
            if json {
                return print_json(&brands);
            }
            brands.into_iter().map(|brand| brand.name).collect()
        }
        LookupKind::Shops => {
            let shops = catalog.shops().await?;
            if json {
                return print_json(&shops);
            }
            shops.into_iter().map(|shop| shop.name).collect()
        }
        LookupKind::Flavors => {
            let flavors = catalog.flavors().await?;
            if json {
                return print_json(&flavors);
            }
            flavors
                .iter()
                .map(|flavor| format!("{:<24}  {}", flavor.key.as_str(), flavor.name))
                .collect()
        }
        LookupKind::Properties => {
            let properties = catalog.properties().await?;
            if json {
                return print_json(&properties);
            }
            properties
                .iter()
                .map(|property| format!("{:<24}  {}", property.key.as_str(), property.name))
                .collect()
        }
        LookupKind::Countries => {
            let countries = catalog.countries().await?;
            if json {
                return print_json(&countries);
            }
            countries
                .iter()
                .map(|country| format!("{:<3} {}", country.code, country.name))
                .collect()
        }
        LookupKind::Currencies => {
            let currencies = catalog.currencies().await?;
            if json {
                return print_json(&currencies);
            }
            currencies
                .iter()
                .map(|currency| {
                    format!(
                        "{:<3} {:<3} {}",
                        currency.code,
                        currency.symbol.as_deref().unwrap_or(""),
                        currency.name
                    )
                })
                .collect()
        }
    };

    for line in lines {
        println!("{line}");
    }
    Ok(())
}
