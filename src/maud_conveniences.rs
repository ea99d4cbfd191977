use crate::form::{Notice, NoticeLevel};
use maud::{Markup, Render, html};

pub fn title(s: impl Render) -> Markup {
    html! {
        h1 class="text-2xl font-semibold mb-4" {(s)}
    }
}

pub fn subtitle(s: impl Render) -> Markup {
    html! {
        h2 class="text-xl font-semibold mb-2" {(s)}
    }
}

pub fn form_element(id: &'static str, label: &'static str, element: Markup) -> Markup {
    html! {
        div class="mb-4" {
            label for=(id) class="block text-sm font-bold mb-2 text-gray-300" {(label)}
            (element)
        }
    }
}

pub fn simple_form_element(
    id: &'static str,
    label: &'static str,
    enabled: bool,
    value: &str,
    placeholder: &'static str,
) -> Markup {
    form_element(
        id,
        label,
        html! {
            input type="text" id=(id) name=(id) value=(value) placeholder=(placeholder) disabled[!enabled]
                class="shadow appearance-none border rounded w-full py-2 px-3 leading-tight focus:outline-none focus:shadow-outline bg-gray-700 border-gray-600 disabled:opacity-50" {}
        },
    )
}

pub fn notice_toast(notice: &Notice) -> Markup {
    let colours = match notice.level {
        NoticeLevel::Info => "bg-blue-100 border-blue-400 text-blue-700",
        NoticeLevel::Success => "bg-green-100 border-green-400 text-green-700",
        NoticeLevel::Error => "bg-red-100 border-red-400 text-red-700",
    };

    html! {
        div class={"border px-4 py-3 rounded relative mb-4 " (colours)} role="alert" {
            span {(notice.message)}
        }
    }
}
