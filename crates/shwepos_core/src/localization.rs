//! Myanmar display labels shared by the FFI and CLI front ends.

use crate::model::product::StockStatus;
use crate::model::transaction::{PaymentMethod, TransactionKind};
use crate::model::user::Tab;

pub fn tab_label(tab: Tab) -> &'static str {
    match tab {
        Tab::Pos => "အမြန်ရောင်းချရေး (POS)",
        Tab::Inventory => "ကုန်ပစ္စည်းစာရင်း",
        Tab::Customers => "ဝယ်ယူသူများ",
        Tab::Transactions => "အရောင်းမှတ်တမ်း",
        Tab::Reports => "အစီရင်ခံစာ",
        Tab::Finance => "ဘဏ္ဍာရေး",
        Tab::Suppliers => "ကုန်ပစ္စည်းပေးသွင်းသူများ",
        Tab::Settings => "ချိန်ညှိချက်များ",
    }
}

pub fn tab_key(tab: Tab) -> &'static str {
    match tab {
        Tab::Pos => "pos",
        Tab::Inventory => "inventory",
        Tab::Customers => "customers",
        Tab::Transactions => "transactions",
        Tab::Reports => "reports",
        Tab::Finance => "finance",
        Tab::Suppliers => "suppliers",
        Tab::Settings => "settings",
    }
}

pub fn payment_method_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cash => "ငွေသား",
        PaymentMethod::Card => "ကတ်",
        PaymentMethod::MobileMoney => "မိုဘိုင်းငွေ",
        PaymentMethod::BankTransfer => "ဘဏ်လွှဲ",
        PaymentMethod::Return => "ပြန်အမ်း",
    }
}

/// Accepts either the stored key (`mobile_money`) or the Myanmar label.
pub fn parse_payment_method(value: &str) -> Option<PaymentMethod> {
    let value = value.trim();
    PaymentMethod::parse(value).or_else(|| {
        PaymentMethod::TENDER
            .into_iter()
            .chain([PaymentMethod::Return])
            .find(|method| payment_method_label(*method) == value)
    })
}

pub fn stock_status_label(status: StockStatus) -> &'static str {
    match status {
        StockStatus::InStock => "ပုံမှန်",
        StockStatus::LowStock => "နည်းနေသည်",
    }
}

pub fn transaction_kind_label(kind: TransactionKind) -> &'static str {
    match kind {
        TransactionKind::Sale => "အရောင်း",
        TransactionKind::Return => "ပြန်အမ်း",
    }
}
