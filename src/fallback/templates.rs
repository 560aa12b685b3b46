use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt::Write;

use super::FallbackInput;
use crate::context::{format_money, EntityDetail};
use crate::monitor::ConnectionState;

const ANALYSIS_HINT: &str = "💡 *Para análise mais detalhada, conecte a IA*";
const SUGGESTION_HINT: &str = "💡 *Para sugestões personalizadas, conecte a IA*";

/// Average ticket above which a customer is premium.
const PREMIUM_TICKET: i64 = 500;
/// Average ticket above which a customer is intermediate.
const INTERMEDIATE_TICKET: i64 = 200;

fn push_hint(out: &mut String, input: &FallbackInput<'_>, hint: &str) {
    if !input.connection.is_operational() {
        out.push('\n');
        out.push_str(hint);
    }
}

fn push_status_breakdown(out: &mut String, counts: &BTreeMap<String, u64>) {
    if counts.is_empty() {
        return;
    }
    out.push_str("\n**Status dos Pedidos:**\n");
    for (status, count) in counts {
        let _ = writeln!(out, "• {}: {}", status, count);
    }
}

fn push_order_figures(out: &mut String, detail: &EntityDetail, currency: &str) {
    if let Some(ticket) = detail.average_ticket() {
        let _ = writeln!(
            out,
            "**Valor Total:** {}",
            format_money(currency, detail.total_spent())
        );
        let _ = writeln!(out, "**Ticket Médio:** {}", format_money(currency, ticket));
    }
}

pub(super) fn customer_analysis(input: &FallbackInput<'_>, currency: &str) -> String {
    let mut out = String::from("**📊 Análise do Cliente**\n\n");

    match input.detail {
        Some(detail) if !detail.is_empty() => {
            if let Some(customer) = &detail.customer {
                let _ = writeln!(out, "**Nome:** {}", customer.name);
                if let Some(email) = customer.email.as_deref().filter(|e| !e.is_empty()) {
                    let _ = writeln!(out, "**Email:** {}", email);
                }
                if let Some(phone) = customer.phone.as_deref().filter(|p| !p.is_empty()) {
                    let _ = writeln!(out, "**Telefone:** {}", phone);
                }
            }

            let _ = writeln!(out, "\n**Total de Pedidos:** {}", detail.orders.len());
            if let Some(ticket) = detail.average_ticket() {
                let _ = writeln!(
                    out,
                    "**Total Gasto:** {}",
                    format_money(currency, detail.total_spent())
                );
                let _ = writeln!(out, "**Ticket Médio:** {}", format_money(currency, ticket));
            }
        }
        _ => {
            let snapshot = input.snapshot;
            let _ = writeln!(out, "**Clientes cadastrados:** {}", snapshot.total_customers);
            if !snapshot.recent_customers.is_empty() {
                out.push_str("\n**Clientes recentes:**\n");
                for customer in &snapshot.recent_customers {
                    let _ = writeln!(out, "• {} (desde {})", customer.name, customer.created_at);
                }
            }
            if snapshot.total_customers > 0 && snapshot.total_orders > 0 {
                let _ = writeln!(
                    out,
                    "\n**Pedidos por cliente:** {:.1}",
                    snapshot.total_orders as f64 / snapshot.total_customers as f64
                );
            }
        }
    }

    push_hint(&mut out, input, ANALYSIS_HINT);
    out
}

pub(super) fn order_analysis(input: &FallbackInput<'_>, currency: &str) -> String {
    let mut out = String::from("**📦 Análise dos Pedidos**\n\n");

    match input.detail.filter(|d| !d.orders.is_empty()) {
        Some(detail) => {
            let _ = writeln!(out, "**Total de Pedidos:** {}", detail.orders.len());
            push_order_figures(&mut out, detail, currency);
            push_status_breakdown(&mut out, &detail.status_breakdown());
        }
        None => {
            let snapshot = input.snapshot;
            let _ = writeln!(out, "**Total de Pedidos:** {}", snapshot.total_orders);
            let _ = writeln!(
                out,
                "**Vendas concluídas:** {}",
                format_money(currency, snapshot.completed_revenue)
            );
            let _ = writeln!(
                out,
                "**Ticket Médio:** {}",
                format_money(currency, snapshot.average_order_value)
            );
            push_status_breakdown(&mut out, &snapshot.orders_by_status);

            if !snapshot.recent_orders.is_empty() {
                out.push_str("\n**Pedidos recentes:**\n");
                for order in &snapshot.recent_orders {
                    let _ = writeln!(
                        out,
                        "• #{} {} - {} ({})",
                        order.id,
                        order.customer_name.as_deref().unwrap_or("?"),
                        format_money(currency, order.total),
                        order.status
                    );
                }
            }
        }
    }

    push_hint(&mut out, input, ANALYSIS_HINT);
    out
}

pub(super) fn product_suggestion(input: &FallbackInput<'_>, currency: &str) -> String {
    let mut out = String::from("**🎯 Sugestões de Produtos**\n\n");

    if let Some(detail) = input.detail {
        match detail.average_ticket() {
            Some(ticket) if ticket > Decimal::from(PREMIUM_TICKET) => {
                out.push_str("**Perfil:** Cliente Premium 💎\n");
                out.push_str("**Sugestões:** Produtos exclusivos, serviços premium\n");
            }
            Some(ticket) if ticket > Decimal::from(INTERMEDIATE_TICKET) => {
                out.push_str("**Perfil:** Cliente Intermediário ⭐\n");
                out.push_str("**Sugestões:** Produtos de valor médio, pacotes promocionais\n");
            }
            Some(_) => {
                out.push_str("**Perfil:** Cliente Básico 👍\n");
                out.push_str("**Sugestões:** Produtos populares, ofertas especiais\n");
            }
            None => {
                out.push_str("**Perfil:** Novo Cliente 🆕\n");
                out.push_str("**Sugestões:** Produtos de introdução, ofertas de boas-vindas\n");
            }
        }
    }

    let products = &input.snapshot.top_stock_products;
    if !products.is_empty() {
        out.push_str("\n**Produtos com maior estoque:**\n");
        for product in products {
            let _ = writeln!(
                out,
                "• {} - {} ({} em estoque)",
                product.name,
                format_money(currency, product.price),
                product.stock
            );
        }
    } else if input.detail.is_none() {
        out.push_str("Nenhum produto cadastrado no momento.\n");
    }

    push_hint(&mut out, input, SUGGESTION_HINT);
    out
}

pub(super) fn system_statistics(input: &FallbackInput<'_>, currency: &str) -> String {
    let snapshot = input.snapshot;
    let mut out = String::from("**📈 Estatísticas do Sistema**\n\n");

    let _ = writeln!(out, "• **Clientes:** {}", snapshot.total_customers);
    let _ = writeln!(out, "• **Produtos:** {}", snapshot.total_products);
    let _ = writeln!(out, "• **Pedidos:** {}", snapshot.total_orders);
    let _ = writeln!(
        out,
        "• **Vendas concluídas:** {}",
        format_money(currency, snapshot.completed_revenue)
    );
    let _ = writeln!(
        out,
        "• **Ticket Médio:** {}",
        format_money(currency, snapshot.average_order_value)
    );
    push_status_breakdown(&mut out, &snapshot.orders_by_status);

    out.push_str(
        "\nPara detalhes, faça perguntas específicas sobre clientes, pedidos ou produtos.\n",
    );
    out
}

pub(super) fn connection_status(input: &FallbackInput<'_>, _currency: &str) -> String {
    match input.connection {
        ConnectionState::Operational => format!(
            "**✅ IA Funcionando**\n\nModelo: {}\nStatus: Respondendo normalmente",
            input.model
        ),
        ConnectionState::Degraded(reason) => format!(
            "**⚠️ IA Conectada com Problemas**\n\nModelo: {}\nA IA está conectada mas não está respondendo corretamente ({}).",
            input.model, reason
        ),
        ConnectionState::ReachableModelUnverified => format!(
            "**🔄 IA Conectada**\n\nModelo: {}\nO modelo está disponível e ainda não foi verificado.",
            input.model
        ),
        ConnectionState::ReachableModelMissing => format!(
            "**⚠️ Modelo Indisponível**\n\nO serviço está acessível, mas o modelo {} não está instalado.",
            input.model
        ),
        ConnectionState::Unreachable | ConnectionState::Unknown => {
            "**💡 Modo Básico**\n\nIA não conectada. Trabalhando com análises básicas dos dados."
                .to_string()
        }
    }
}

pub(super) fn help(_input: &FallbackInput<'_>, _currency: &str) -> String {
    "**🤖 Assistente de Ajuda**\n\n\
     **Funcionalidades:**\n\
     • Análise de clientes\n\
     • Análise de pedidos\n\
     • Sugestões de produtos\n\
     • Estatísticas do sistema\n\n\
     **Comandos úteis:**\n\
     • \"Analisar cliente\" - Dados do cliente\n\
     • \"Analisar pedidos\" - Resumo de pedidos\n\
     • \"Sugerir produtos\" - Recomendações\n\
     • \"Estatísticas\" - Dados do sistema\n\n\
     💡 *Estou aqui para ajudar! Faça perguntas sobre seus dados.*"
        .to_string()
}

pub(super) fn conceptual_definition(input: &FallbackInput<'_>, currency: &str) -> String {
    let lowered = input.question.to_lowercase();

    if lowered.contains("ticket") {
        return format!(
            "**💰 O que é Ticket Médio?**\n\n\
             O **ticket médio** é o valor médio gasto por pedido: o total vendido dividido \
             pelo número de pedidos.\n\n\
             **Ticket médio atual (pedidos concluídos):** {}",
            format_money(currency, input.snapshot.average_order_value)
        );
    }

    if lowered.contains("estoque") {
        return format!(
            "**📦 O que é Estoque?**\n\n\
             O **estoque** é a quantidade de cada produto disponível para venda.\n\n\
             **Produtos cadastrados:** {}",
            input.snapshot.total_products
        );
    }

    format!(
        "**🤔 Sobre sua pergunta:** \"{}\"\n\n\
         No momento estou focado em análises práticas dos seus dados:\n\n\
         • **Clientes** - Informações e histórico\n\
         • **Pedidos** - Análise de vendas\n\
         • **Sugestões** - Recomendações de produtos\n\
         • **Estatísticas** - Dados do sistema\n\n\
         Para explicações mais detalhadas sobre conceitos, conecte a IA.",
        input.question.trim()
    )
}

pub(super) fn general(input: &FallbackInput<'_>, _currency: &str) -> String {
    let question = input.question.trim();
    let title = if question.is_empty() {
        "**💭 Como posso ajudar?**".to_string()
    } else {
        format!("**💭 Sobre: \"{}\"**", question)
    };

    format!(
        "{}\n\n\
         Posso ajudá-lo com:\n\n\
         • **Análises** de clientes e pedidos\n\
         • **Sugestões** baseadas nos dados\n\
         • **Estatísticas** do sistema\n\n\
         **Experimente perguntar sobre:**\n\
         - \"Quantos clientes temos?\"\n\
         - \"Quais são os pedidos recentes?\"\n\
         - \"Sugerir produtos para um cliente\"",
        title
    )
}
