// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure invoice payload construction for Xero's Invoices API.
//!
//! Serializes to the PascalCase JSON shape Xero expects. All money and
//! quantity arithmetic uses `Decimal`; float rounding never reaches the
//! payload.

use std::collections::BTreeMap;

use myportal_storage::queries::tickets::BillableTicket;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

const MINUTES_PER_HOUR: Decimal = Decimal::from_parts(60, 0, 0, false, 0);

/// Shared invoice parameters from the `xero` module settings.
#[derive(Debug, Clone)]
pub struct InvoiceParams {
    pub hourly_rate: Decimal,
    pub account_code: Option<String>,
    pub tax_type: Option<String>,
    pub line_amount_type: String,
    pub reference_prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Contact {
    pub contact_number: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct LineItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Invoice {
    #[serde(rename = "Type")]
    pub invoice_type: String,
    pub contact: Contact,
    pub line_items: Vec<LineItem>,
    pub line_amount_types: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// One line of a shop order.
#[derive(Debug, Clone)]
pub struct OrderItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_amount: Decimal,
}

/// Build accounts-receivable invoices from billable ticket time.
///
/// Tickets group by `company_id`, one invoice per company. Each ticket with
/// billable minutes contributes one line with `Quantity` in hours. Tickets
/// without a company cannot be invoiced and are dropped with a warning;
/// companies whose tickets carry no billable time produce no invoice.
pub fn build_ticket_invoices(
    billables: &[BillableTicket],
    params: &InvoiceParams,
) -> Vec<Invoice> {
    let mut by_company: BTreeMap<i64, Vec<&BillableTicket>> = BTreeMap::new();
    for billing in billables {
        match billing.company_id {
            Some(company_id) => by_company.entry(company_id).or_default().push(billing),
            None => {
                warn!(ticket_id = billing.ticket_id, "ticket has no company, not invoiced");
            }
        }
    }

    let mut invoices = Vec::new();
    for (company_id, tickets) in by_company {
        let lines: Vec<LineItem> = tickets
            .iter()
            .filter(|t| t.billable_minutes > 0)
            .map(|t| LineItem {
                description: line_description(t, params.reference_prefix.as_deref()),
                quantity: Decimal::from(t.billable_minutes) / MINUTES_PER_HOUR,
                unit_amount: params.hourly_rate,
                account_code: params.account_code.clone(),
                tax_type: params.tax_type.clone(),
            })
            .collect();
        if lines.is_empty() {
            continue;
        }
        invoices.push(Invoice {
            invoice_type: "ACCREC".to_string(),
            contact: Contact {
                contact_number: company_id.to_string(),
            },
            line_items: lines,
            line_amount_types: params.line_amount_type.clone(),
            reference: params.reference_prefix.clone(),
        });
    }
    invoices
}

/// Build a single invoice from shop order items.
pub fn build_order_invoice(
    order_number: &str,
    company_id: i64,
    items: &[OrderItem],
    params: &InvoiceParams,
) -> Invoice {
    Invoice {
        invoice_type: "ACCREC".to_string(),
        contact: Contact {
            contact_number: company_id.to_string(),
        },
        line_items: items
            .iter()
            .map(|item| LineItem {
                description: item.description.clone(),
                quantity: item.quantity,
                unit_amount: item.unit_amount,
                account_code: params.account_code.clone(),
                tax_type: params.tax_type.clone(),
            })
            .collect(),
        line_amount_types: params.line_amount_type.clone(),
        reference: Some(match &params.reference_prefix {
            Some(prefix) => format!("{prefix}{order_number}"),
            None => order_number.to_string(),
        }),
    }
}

fn line_description(billing: &BillableTicket, prefix: Option<&str>) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => {
            format!("{prefix}#{}: {}", billing.ticket_id, billing.subject)
        }
        _ => format!("Ticket #{}: {}", billing.ticket_id, billing.subject),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromPrimitive;

    fn params(rate: f64) -> InvoiceParams {
        InvoiceParams {
            hourly_rate: Decimal::from_f64(rate).unwrap(),
            account_code: Some("200".to_string()),
            tax_type: None,
            line_amount_type: "Exclusive".to_string(),
            reference_prefix: None,
        }
    }

    fn billing(ticket_id: i64, company_id: Option<i64>, minutes: i64) -> BillableTicket {
        BillableTicket {
            ticket_id,
            subject: format!("Ticket {ticket_id}"),
            company_id,
            billable_minutes: minutes,
        }
    }

    #[test]
    fn groups_by_company_and_omits_zero_billable_tickets() {
        // Ticket 1 carries 30 billable minutes, ticket 2 none.
        let invoices = build_ticket_invoices(
            &[billing(1, Some(7), 30), billing(2, Some(7), 0)],
            &params(150.0),
        );
        assert_eq!(invoices.len(), 1);
        let invoice = &invoices[0];
        assert_eq!(invoice.invoice_type, "ACCREC");
        assert_eq!(invoice.contact.contact_number, "7");
        assert_eq!(invoice.line_items.len(), 1);
        assert_eq!(invoice.line_items[0].quantity, Decimal::new(5, 1));
        assert_eq!(invoice.line_items[0].unit_amount, Decimal::from(150));
    }

    #[test]
    fn company_with_no_billable_time_yields_no_invoice() {
        let invoices = build_ticket_invoices(&[billing(1, Some(3), 0)], &params(100.0));
        assert!(invoices.is_empty());
    }

    #[test]
    fn tickets_without_company_are_dropped() {
        let invoices = build_ticket_invoices(&[billing(1, None, 60)], &params(100.0));
        assert!(invoices.is_empty());
    }

    #[test]
    fn separate_companies_get_separate_invoices() {
        let invoices = build_ticket_invoices(
            &[billing(1, Some(1), 60), billing(2, Some(2), 90)],
            &params(100.0),
        );
        assert_eq!(invoices.len(), 2);
        assert_eq!(invoices[0].contact.contact_number, "1");
        assert_eq!(invoices[1].line_items[0].quantity, Decimal::new(15, 1));
    }

    #[test]
    fn serializes_to_pascal_case() {
        let invoices = build_ticket_invoices(&[billing(1, Some(7), 45)], &params(150.0));
        let json = serde_json::to_value(&invoices[0]).unwrap();
        assert_eq!(json["Type"], "ACCREC");
        assert_eq!(json["Contact"]["ContactNumber"], "7");
        assert_eq!(json["LineAmountTypes"], "Exclusive");
        assert_eq!(json["LineItems"][0]["Quantity"], serde_json::json!(0.75));
        assert_eq!(json["LineItems"][0]["AccountCode"], "200");
        assert!(json["LineItems"][0].get("TaxType").is_none());
    }

    #[test]
    fn order_invoice_takes_line_values_from_items() {
        let invoice = build_order_invoice(
            "SO-1001",
            9,
            &[
                OrderItem {
                    description: "Widget".to_string(),
                    quantity: Decimal::from(3),
                    unit_amount: Decimal::new(1995, 2),
                },
                OrderItem {
                    description: "Shipping".to_string(),
                    quantity: Decimal::ONE,
                    unit_amount: Decimal::from(10),
                },
            ],
            &params(0.0),
        );
        assert_eq!(invoice.line_items.len(), 2);
        assert_eq!(invoice.line_items[0].unit_amount, Decimal::new(1995, 2));
        assert_eq!(invoice.reference.as_deref(), Some("SO-1001"));
    }
}
