// DANS: src/math/valuation.rs

/// Convertit une quantité de tokens en USD.
///
/// - USDC / USDT : parité 1:1.
/// - SOL / WSOL : valorisés au prix du SOL.
/// - Le reste : au prix du token fourni par le flux.
///
/// Un prix manquant arrive ici sous forme de 0 ; la fonction ne peut pas échouer.
pub fn valuate_usd(symbol: &str, amount: f64, token_price_usd: f64, sol_price_usd: f64) -> f64 {
    match symbol {
        "USDC" | "USDT" => amount,
        "SOL" | "WSOL" => amount * sol_price_usd,
        _ => amount * token_price_usd,
    }
}
