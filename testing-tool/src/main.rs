use colored::*;
use std::io::{self, Write};
use std::time::Instant;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "📷 Photo Cache Proxy - Testing Tool".bright_blue().bold());
    println!("{}", "=====================================".bright_blue());
    println!();

    // Paso 1: Pedir la URL del proxy
    let base_url = get_base_url()?;
    let client = reqwest::Client::new();

    // Paso 2: Menú principal
    loop {
        println!();
        println!("{}", "📋 MENÚ PRINCIPAL".bright_green().bold());
        println!("{}", "==================".bright_green());
        println!("1. 🗂️  GET /photos");
        println!("2. 🖼️  GET /photos/:id");
        println!("3. 🩺 GET /health");
        println!("4. 🚪 Salir");
        print!("{}", "Selecciona una opción (1-4): ".bright_yellow());
        io::stdout().flush()?;

        let choice = read_line()?;

        match choice.as_str() {
            "1" => {
                probe(&client, &format!("{}/photos", base_url)).await?;
            }
            "2" => {
                print!("{}", "ID de la foto: ".bright_yellow());
                io::stdout().flush()?;
                let id = read_line()?;
                probe(&client, &format!("{}/photos/{}", base_url, id)).await?;
            }
            "3" => {
                probe(&client, &format!("{}/health", base_url)).await?;
            }
            "4" => {
                println!("{}", "👋 ¡Hasta luego!".bright_green());
                break;
            }
            _ => {
                println!("{}", "❌ Opción inválida. Intenta de nuevo.".bright_red());
            }
        }
    }

    Ok(())
}

fn read_line() -> Result<String, Box<dyn std::error::Error>> {
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn get_base_url() -> Result<String, Box<dyn std::error::Error>> {
    print!("{}", "URL del proxy [http://localhost:3000]: ".bright_yellow());
    io::stdout().flush()?;
    let url = read_line()?;
    if url.is_empty() {
        Ok("http://localhost:3000".to_string())
    } else {
        Ok(url.trim_end_matches('/').to_string())
    }
}

/// Hace la petición y muestra estado, cabecera x-cache, latencia y tamaño
async fn probe(client: &reqwest::Client, url: &str) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("{}", "📤 URL:".bright_blue());
    println!("{}", url);

    let started = Instant::now();
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            println!("{}", format!("❌ Error de conexión: {}", e).bright_red());
            return Ok(());
        }
    };

    let status = response.status();
    let cache = response
        .headers()
        .get("x-cache")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let body = response.text().await?;
    let elapsed = started.elapsed();

    println!();
    println!("{}", "📥 RESPUESTA:".bright_green().bold());
    let status_line = format!("   Status:   {}", status);
    if status.is_success() {
        println!("{}", status_line.bright_green());
    } else {
        println!("{}", status_line.bright_red());
    }
    let cache_line = format!("   x-cache:  {}", cache);
    match cache.as_str() {
        "HIT" => println!("{}", cache_line.bright_green()),
        "MISS" => println!("{}", cache_line.bright_yellow()),
        _ => println!("{}", cache_line),
    }
    println!("   Latencia: {:.1} ms", elapsed.as_secs_f64() * 1000.0);
    println!("   Tamaño:   {} bytes", body.len());

    // Mostrar una vista previa del JSON
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(serde_json::Value::Array(items)) => {
            println!("   Items:    {}", items.len());
            if let Some(first) = items.first() {
                println!("{}", "📄 Primer elemento:".bright_blue());
                println!("{}", serde_json::to_string_pretty(first)?);
            }
        }
        Ok(value) => {
            println!("{}", "📄 Body:".bright_blue());
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Err(_) if body.is_empty() => println!("{}", "📄 Body vacío".bright_blue()),
        Err(_) => {
            println!("{}", "⚠️ El body no es JSON:".bright_yellow());
            println!("{}", body);
        }
    }

    Ok(())
}
